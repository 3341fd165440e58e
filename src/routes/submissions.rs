use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use once_cell::sync::Lazy;

use crate::middlewares::{self, RequireJWT};
use crate::models::submissions::requests::{ReviewRequest, SubmissionListParams, SubmitRequest};
use crate::models::users::entities::UserRole;
use crate::services::SubmissionService;
use crate::utils::SafeIDI64;

// 懒加载的全局 SubmissionService 实例
static SUBMISSION_SERVICE: Lazy<SubmissionService> = Lazy::new(SubmissionService::new_lazy);

// 学生提交（挂在 /tasks/{id}/submit 下）
pub async fn submit_task(
    req: HttpRequest,
    path: SafeIDI64,
    body: web::Json<SubmitRequest>,
) -> ActixResult<HttpResponse> {
    SUBMISSION_SERVICE
        .submit(&req, path.0, body.into_inner())
        .await
}

// 学生在任务下的提交（挂在 /tasks/{id}/submission 下）
pub async fn get_my_submission(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    SUBMISSION_SERVICE.get_my_submission(&req, path.0).await
}

// 任务下的全部提交（挂在 /tasks/{id}/submissions 下）
pub async fn list_task_submissions(
    req: HttpRequest,
    path: SafeIDI64,
    query: web::Query<SubmissionListParams>,
) -> ActixResult<HttpResponse> {
    SUBMISSION_SERVICE
        .list_by_task(&req, path.0, query.into_inner())
        .await
}

// 我的提交
pub async fn list_my_submissions(
    req: HttpRequest,
    query: web::Query<SubmissionListParams>,
) -> ActixResult<HttpResponse> {
    SUBMISSION_SERVICE
        .list_mine(&req, query.into_inner())
        .await
}

pub async fn get_submission(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    SUBMISSION_SERVICE.get_submission(&req, path.0).await
}

// 批阅
pub async fn review_submission(
    req: HttpRequest,
    path: SafeIDI64,
    body: web::Json<ReviewRequest>,
) -> ActixResult<HttpResponse> {
    SUBMISSION_SERVICE
        .review(&req, path.0, body.into_inner())
        .await
}

// 配置路由
pub fn configure_submissions_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/submissions")
            .wrap(RequireJWT)
            .service(
                web::resource("")
                    .route(web::get().to(list_my_submissions))
                    .wrap(middlewares::RequireRole::new_any(UserRole::student_roles())),
            )
            // 详情 - 业务层校验查看权限
            .service(web::resource("/{id}").route(web::get().to(get_submission)))
            .service(
                web::resource("/{id}/review")
                    .route(web::post().to(review_submission))
                    .wrap(middlewares::RequireRole::new_any(UserRole::teacher_roles())),
            ),
    );
}
