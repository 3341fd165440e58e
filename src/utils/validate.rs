use once_cell::sync::Lazy;
use regex::Regex;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid username regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 -]{4,19}$").expect("Invalid phone regex"));

// 上传后生成的文件名：`{时间戳}-{uuid}{扩展名}`
static STORED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]+-[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}(\.[a-z0-9]{1,8})?$")
        .expect("Invalid stored name regex")
});

pub fn validate_username(username: &str) -> Result<(), &'static str> {
    // 用户名长度校验：3 <= x <= 32
    if username.len() < 3 || username.len() > 32 {
        return Err("用户名长度必须在 3 到 32 个字符之间");
    }
    if !USERNAME_RE.is_match(username) {
        return Err("用户名只能包含字母、数字、下划线或连字符");
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), &'static str> {
    let len = name.trim().chars().count();
    if len == 0 || len > 64 {
        return Err("姓名长度必须在 1 到 64 个字符之间");
    }
    Ok(())
}

/// 空字符串表示清空，允许通过
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    if !phone.is_empty() && !PHONE_RE.is_match(phone) {
        return Err("手机号格式无效");
    }
    Ok(())
}

/// 只接受上传接口生成的文件名，防止路径穿越
pub fn is_safe_stored_name(name: &str) -> bool {
    STORED_NAME_RE.is_match(name)
}

/// 初始密码强度检查：至少 8 位，包含大小写字母和数字
pub fn is_strong_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username() {
        assert!(validate_username("teacher").is_ok());
        assert!(validate_username("s_2024-01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("").is_ok());
        assert!(validate_phone("+86 138-0000-0000").is_ok());
        assert!(validate_phone("call me").is_err());
    }

    #[test]
    fn test_stored_name() {
        assert!(is_safe_stored_name(
            "1700000000-550e8400-e29b-41d4-a716-446655440000.pdf"
        ));
        assert!(is_safe_stored_name(
            "1700000000-550e8400-e29b-41d4-a716-446655440000"
        ));
        assert!(!is_safe_stored_name("../../etc/passwd"));
        assert!(!is_safe_stored_name(
            "1700000000-550e8400-e29b-41d4-a716-446655440000.pdf/../x"
        ));
        assert!(!is_safe_stored_name("report.pdf"));
    }

    #[test]
    fn test_password_strength() {
        assert!(is_strong_password("SecurePass123"));
        assert!(!is_strong_password("short1A"));
        assert!(!is_strong_password("alllowercase1"));
    }
}
