// Key masking for logs
pub fn mask_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        return "****".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", start, end)
}

pub fn key_hint(key: &str) -> String {
    if key.is_empty() {
        "<none>".to_string()
    } else {
        mask_key(key)
    }
}
