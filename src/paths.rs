//! 路径工具
//!
//! 后端返回的路径是字符串（可能是 `/` 或 `\` 分隔），这里的函数只做纯字符串运算，
//! 不访问文件系统。

fn is_sep(ch: char) -> bool {
    ch == '/' || ch == '\\'
}

/// 根据已有路径推断分隔符：只含 `\` 时视为 Windows 风格
pub fn separator_of(path: &str) -> char {
    if path.contains('\\') && !path.contains('/') {
        '\\'
    } else {
        '/'
    }
}

fn trim_trailing_sep(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_sep);
    if trimmed.is_empty() && !path.is_empty() {
        // 根目录本身
        &path[..1]
    } else {
        trimmed
    }
}

pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    let name = name.trim_start_matches(is_sep);
    if dir.ends_with(is_sep) {
        return format!("{dir}{name}");
    }
    format!("{dir}{}{name}", separator_of(dir))
}

pub fn parent(path: &str) -> Option<&str> {
    let path = trim_trailing_sep(path);
    let idx = path.rfind(is_sep)?;
    if idx == 0 {
        if path.len() == 1 {
            return None;
        }
        return Some(&path[..1]);
    }
    Some(&path[..idx])
}

pub fn file_name(path: &str) -> &str {
    let path = trim_trailing_sep(path);
    match path.rfind(is_sep) {
        Some(idx) if path.len() > 1 => &path[idx + 1..],
        Some(_) => "",
        None => path,
    }
}

/// 文件后缀（最后一个 `.` 之后的部分），没有 `.` 时为 `None`
pub fn suffix(name: &str) -> Option<&str> {
    let idx = name.rfind('.')?;
    Some(&name[idx + 1..])
}

/// 按路径段替换前缀：`prefix` 只在分隔符边界上匹配，`/a` 不会改写 `/ab/x`
pub fn replace_prefix(path: &str, prefix: &str, replacement: &str) -> Option<String> {
    if prefix.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(prefix)?;
    let on_boundary = rest.is_empty() || prefix.ends_with(is_sep) || rest.starts_with(is_sep);
    if !on_boundary {
        return None;
    }
    Some(format!("{replacement}{rest}"))
}

pub fn is_within(path: &str, prefix: &str) -> bool {
    replace_prefix(path, prefix, "").is_some()
}
