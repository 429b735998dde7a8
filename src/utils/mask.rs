/// Masks sensitive values (tax codes, plates, api keys) before logging.
pub fn mask_sensitive(value: &str) -> String {
    if value.is_empty() {
        return "".to_string();
    }

    let len = value.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }

    let chars: Vec<char> = value.chars().collect();
    format!(
        "{}{}{}",
        chars[..2].iter().collect::<String>(),
        "*".repeat(len - 4),
        chars[len - 2..].iter().collect::<String>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_tax_code() {
        assert_eq!(mask_sensitive("RSSMRA85T10A562S"), "RS************2S");
        assert_eq!(mask_sensitive("abc"), "***");
        assert_eq!(mask_sensitive(""), "");
    }
}
