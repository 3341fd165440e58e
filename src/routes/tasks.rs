use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use once_cell::sync::Lazy;

use super::submissions::{get_my_submission, list_task_submissions, submit_task};
use crate::middlewares::{self, RequireJWT};
use crate::models::tasks::requests::{
    AssignStudentsRequest, CreateTaskRequest, TaskListParams, UpdateTaskRequest,
};
use crate::models::users::entities::UserRole;
use crate::services::TaskService;
use crate::utils::SafeIDI64;

// 懒加载的全局 TaskService 实例
static TASK_SERVICE: Lazy<TaskService> = Lazy::new(TaskService::new_lazy);

// 列出任务（按角色返回）
pub async fn list_tasks(
    req: HttpRequest,
    query: web::Query<TaskListParams>,
) -> ActixResult<HttpResponse> {
    TASK_SERVICE.list_tasks(&req, query.into_inner()).await
}

// 创建任务
pub async fn create_task(
    req: HttpRequest,
    body: web::Json<CreateTaskRequest>,
) -> ActixResult<HttpResponse> {
    TASK_SERVICE.create_task(&req, body.into_inner()).await
}

// 获取任务详情
pub async fn get_task(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    TASK_SERVICE.get_task(&req, path.0).await
}

// 更新任务
pub async fn update_task(
    req: HttpRequest,
    path: SafeIDI64,
    body: web::Json<UpdateTaskRequest>,
) -> ActixResult<HttpResponse> {
    TASK_SERVICE.update_task(&req, path.0, body.into_inner()).await
}

// 删除任务
pub async fn delete_task(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    TASK_SERVICE.delete_task(&req, path.0).await
}

pub async fn publish_task(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    TASK_SERVICE.publish_task(&req, path.0).await
}

pub async fn complete_task(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    TASK_SERVICE.complete_task(&req, path.0).await
}

// 替换学生名单
pub async fn assign_students(
    req: HttpRequest,
    path: SafeIDI64,
    body: web::Json<AssignStudentsRequest>,
) -> ActixResult<HttpResponse> {
    TASK_SERVICE
        .assign_students(&req, path.0, body.into_inner())
        .await
}

pub async fn get_statistics(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    TASK_SERVICE.get_statistics(&req, path.0).await
}

pub async fn get_students_status(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    TASK_SERVICE.get_students_status(&req, path.0).await
}

pub async fn get_file_statistics(req: HttpRequest, path: SafeIDI64) -> ActixResult<HttpResponse> {
    TASK_SERVICE.get_file_statistics(&req, path.0).await
}

// 配置路由
pub fn configure_tasks_routes(cfg: &mut web::ServiceConfig) {
    let teacher_only = || middlewares::RequireRole::new_any(UserRole::teacher_roles());
    let student_only = || middlewares::RequireRole::new_any(UserRole::student_roles());

    cfg.service(
        web::scope("/api/v1/tasks")
            .wrap(RequireJWT)
            .service(
                web::resource("")
                    // 列出任务 - 所有登录用户（业务层按角色过滤）
                    .route(web::get().to(list_tasks))
                    // 创建任务 - 仅教师
                    .route(web::post().to(create_task).wrap(teacher_only())),
            )
            .service(
                web::resource("/{id}")
                    // 任务详情 - 业务层校验所有者或分配关系
                    .route(web::get().to(get_task))
                    .route(web::put().to(update_task).wrap(teacher_only()))
                    .route(web::delete().to(delete_task).wrap(teacher_only())),
            )
            .service(
                web::resource("/{id}/publish")
                    .route(web::post().to(publish_task))
                    .wrap(teacher_only()),
            )
            .service(
                web::resource("/{id}/complete")
                    .route(web::post().to(complete_task))
                    .wrap(teacher_only()),
            )
            .service(
                web::resource("/{id}/students")
                    .route(web::put().to(assign_students))
                    .wrap(teacher_only()),
            )
            .service(
                web::resource("/{id}/statistics")
                    .route(web::get().to(get_statistics))
                    .wrap(teacher_only()),
            )
            .service(
                web::resource("/{id}/students-status")
                    .route(web::get().to(get_students_status))
                    .wrap(teacher_only()),
            )
            .service(
                web::resource("/{id}/files/statistics")
                    .route(web::get().to(get_file_statistics))
                    .wrap(teacher_only()),
            )
            .service(
                web::resource("/{id}/submissions")
                    .route(web::get().to(list_task_submissions))
                    .wrap(teacher_only()),
            )
            .service(
                web::resource("/{id}/submit")
                    .route(web::post().to(submit_task))
                    .wrap(student_only()),
            )
            .service(
                web::resource("/{id}/submission")
                    .route(web::get().to(get_my_submission))
                    .wrap(student_only()),
            ),
    );
}
