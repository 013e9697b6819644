//! Default table names.

/// Table name for a definition name: last path segment, snake_cased,
/// with its final word pluralised.
///
/// `app::CompanyProvider` becomes `company_providers`, `Category` becomes
/// `categories`.
pub fn table_name_for(name: &str) -> String {
    let segment = name
        .rsplit(|c| c == ':' || c == '\\' || c == '/' || c == '.')
        .find(|s| !s.is_empty())
        .unwrap_or("");
    pluralize(&snake_case(segment.trim()))
}

/// `CompanyProvider` -> `company_provider`, `HTTPLog` -> `http_log`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let boundary = prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out.trim_end_matches('_').to_string()
}

/// English plural of the last word of a snake_case name.
pub fn pluralize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let (head, word) = match name.rfind('_') {
        Some(i) => name.split_at(i + 1),
        None => ("", name),
    };
    format!("{}{}", head, plural_word(word))
}

fn plural_word(word: &str) -> String {
    const UNCOUNTABLE: &[&str] = &["data", "equipment", "information", "media", "metadata", "news", "series", "species"];
    const IRREGULAR: &[(&str, &str)] = &[
        ("person", "people"),
        ("child", "children"),
        ("man", "men"),
        ("woman", "women"),
        ("mouse", "mice"),
    ];

    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }

    let consonant_before = |suffix_len: usize| {
        word.chars()
            .rev()
            .nth(suffix_len)
            .map_or(false, |c| !"aeiou".contains(c))
    };

    if word.ends_with('y') && consonant_before(1) {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// `1st`, `2nd`, `3rd`, `11th`, `22nd`.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}
