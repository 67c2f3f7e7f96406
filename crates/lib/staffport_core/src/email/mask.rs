//! Masking of addresses and identifiers for log output.

const SEPARATORS: [char; 3] = ['-', '.', '_'];

/// Masks an email address, keeping the first character of each part,
/// e.g. `j***_d**@e******.o**`. Returns an empty string when the input
/// is not a plausible address.
pub fn mask_email(email: &str) -> String {
    let mut parts = email.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return String::new();
    };
    if domain.contains('@') {
        return String::new();
    }
    format!("{}@{}", mask_string(local), mask_string(domain))
}

/// Masks all but the first character of each part of a string, where
/// parts are split on `-`, `.`, or `_`. Empty parts are dropped; the
/// first separator present in the input joins the masked parts.
pub fn mask_string(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let masked: Vec<String> = s
        .split(SEPARATORS)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut chars = p.chars();
            match chars.next() {
                Some(first) if chars.next().is_some() => {
                    format!("{}{}", first, "*".repeat(p.chars().count() - 1))
                }
                _ => "*".to_string(),
            }
        })
        .collect();

    match s.chars().find(|c| SEPARATORS.contains(c)) {
        None => masked[0].clone(),
        Some(sep) => masked.join(&sep.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn very_short_name() {
        assert_eq!("*@e******.o**", mask_email("x@example.org"));
    }

    #[test]
    fn single_domain() {
        assert_eq!("j***_d**@e******.o**", mask_email("john_doe@example.org"));
    }

    #[test]
    fn subdomain() {
        assert_eq!(
            "j***.d**@e****.e******.o**",
            mask_email("john.doe@email.example.org")
        );
    }

    #[test]
    fn adjacent_separators() {
        assert_eq!(
            "j***.d**@e****.e******.o**",
            mask_email("john..doe@email._example.org")
        );
    }

    #[test]
    fn separator_at_start_or_end() {
        assert_eq!(
            "j***_d**@e****.e******.o**",
            mask_email("_john_doe@email.example.org.")
        );
    }

    #[test]
    fn not_an_address() {
        assert_eq!("", mask_email("not-an-email"));
        assert_eq!("", mask_email("two@at@signs"));
    }

    #[test]
    fn mask_string_plain() {
        assert_eq!("1****", mask_string("10001"));
        assert_eq!("*", mask_string("x"));
        assert_eq!("", mask_string(""));
    }
}
