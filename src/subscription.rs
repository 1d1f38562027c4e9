//! Cookies and name filters shared by the state-bag and convar notifiers.

use std::cell::Cell;
use std::fmt;

/// Opaque registration token. Removing an unknown cookie is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cookie(pub i32);

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out cookies in increasing order. Once the counter is spent it wraps
/// to 1 and skips every cookie the owner reports as still live.
#[derive(Debug)]
pub struct CookieJar {
    next: Cell<i32>,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self { next: Cell::new(1) }
    }
}

impl CookieJar {
    pub fn next(&self, is_live: impl Fn(Cookie) -> bool) -> Cookie {
        loop {
            let cookie = Cookie(self.next.get());
            self.next.set(cookie.0.checked_add(1).unwrap_or(1));
            if !is_live(cookie) {
                return cookie;
            }
        }
    }

    #[cfg(test)]
    fn starting_at(next: i32) -> Self {
        Self { next: Cell::new(next) }
    }
}

/// `true` when `name` matches `filter`. An empty filter matches everything;
/// `*` matches any run of characters.
pub fn matches_filter(filter: &str, name: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    if !filter.contains('*') {
        return filter == name;
    }

    let mut parts = filter.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return true;
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_anything() {
        assert!(matches_filter("", "health"));
        assert!(matches_filter("", ""));
    }

    #[test]
    fn test_exact_and_glob() {
        assert!(matches_filter("health", "health"));
        assert!(!matches_filter("health", "armor"));
        assert!(matches_filter("entity:*", "entity:12"));
        assert!(!matches_filter("entity:*", "player:12"));
        assert!(matches_filter("sv_*name", "sv_hostname"));
        assert!(matches_filter("*", "anything"));
        assert!(matches_filter("a*b*c", "a_b_c"));
        assert!(!matches_filter("a*b*c", "a_c_b"));
        assert!(!matches_filter("ab*ba", "aba"));
    }

    #[test]
    fn test_cookies_are_unique() {
        let jar = CookieJar::default();
        let a = jar.next(|_| false);
        let b = jar.next(|_| false);
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_wrapped_jar_skips_live_cookies() {
        let jar = CookieJar::starting_at(i32::MAX);
        assert_eq!(jar.next(|_| false), Cookie(i32::MAX));
        let live = [Cookie(1), Cookie(2)];
        assert_eq!(jar.next(|c| live.contains(&c)), Cookie(3));
        assert_eq!(jar.next(|c| live.contains(&c)), Cookie(4));
    }

    #[test]
    fn test_literal_star_is_a_wildcard() {
        // `*` in a filter is always a wildcard, never a literal
        assert!(matches_filter("door*", "door*"));
        assert!(matches_filter("door*", "door_left"));
        assert!(!matches_filter("door", "door*"));
    }
}
