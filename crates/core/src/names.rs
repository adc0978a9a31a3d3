//! Identifier helpers shared by view projection and conversion synthesis.

use std::collections::{HashMap, HashSet};

use tracing::trace;

/// Claim a name derived from `base` that is not in `taken`: `base`, then
/// `base2`, `base3` and so on.
pub fn uniquify(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut idx = 2;
    while taken.contains(&name) {
        name = format!("{}{}", base, idx);
        idx += 1;
    }
    taken.insert(name.clone());
    name
}

/// A naming scope. Names claimed through the same logical key are
/// remembered, so asking twice for one key returns one name.
#[derive(Debug, Default)]
pub struct Uniquifier {
    taken: HashSet<String>,
    by_key: HashMap<String, String>,
}

impl Uniquifier {
    pub fn new() -> Self {
        Uniquifier::default()
    }

    /// Claim a fresh name.
    pub fn unique(&mut self, base: &str) -> String {
        uniquify(base, &mut self.taken)
    }

    /// The name already claimed for `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    /// The name for `key`, claiming one derived from `base` the first time.
    pub fn name_for(&mut self, key: &str, base: &str) -> String {
        if let Some(name) = self.by_key.get(key) {
            return name.clone();
        }
        let name = uniquify(base, &mut self.taken);
        trace!(key, name = %name, "claimed name");
        self.by_key.insert(key.to_string(), name.clone());
        name
    }
}

/// `goa.bottle` -> `GoaBottle`, `extended-info` -> `ExtendedInfo`.
pub fn title_case(s: &str) -> String {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(upper_first)
        .collect()
}

pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `UserID` -> `user_id`, `firstName` -> `first_name`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniquify_appends_counter() {
        let mut taken = HashSet::new();
        assert_eq!(uniquify("Foo", &mut taken), "Foo");
        assert_eq!(uniquify("Foo", &mut taken), "Foo2");
        assert_eq!(uniquify("Foo", &mut taken), "Foo3");
        assert_eq!(uniquify("Bar", &mut taken), "Bar");
    }

    #[test]
    fn name_for_is_memoized_by_key() {
        let mut names = Uniquifier::new();
        let a = names.name_for("User->Person", "transformUserToPerson");
        let b = names.name_for("User->Person", "transformUserToPerson");
        let c = names.name_for("Other", "transformUserToPerson");
        assert_eq!(a, b);
        assert_eq!(c, "transformUserToPerson2");
        assert_eq!(names.lookup("Other"), Some("transformUserToPerson2"));
    }

    #[test]
    fn case_helpers() {
        assert_eq!(title_case("goa.bottle"), "GoaBottle");
        assert_eq!(title_case("extended-info"), "ExtendedInfo");
        assert_eq!(lower_first("Name"), "name");
        assert_eq!(upper_first("name"), "Name");
        assert_eq!(snake_case("FirstName"), "first_name");
        assert_eq!(snake_case("UserID"), "user_id");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }
}
