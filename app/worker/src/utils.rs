//! Config helpers shared by the worker and the gateway.

/// Expand `${VAR}` and `${VAR:-fallback}` references with environment
/// variable values.
///
/// An unset (or empty, with a fallback) variable expands to the fallback,
/// or to nothing. An unterminated `${` is kept as written.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let reference = &after[..end];
        let (name, fallback) = match reference.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (reference, None),
        };
        match (std::env::var(name), fallback) {
            (Ok(value), Some(fallback)) if value.is_empty() => result.push_str(fallback),
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(fallback)) => result.push_str(fallback),
            (Err(_), None) => {}
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::expand_env_vars;

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(expand_env_vars("host = \"a:1\""), "host = \"a:1\"");
    }

    #[test]
    fn unset_variable_uses_fallback() {
        assert_eq!(
            expand_env_vars("${SNAPFX_SURELY_UNSET_VAR:-127.0.0.1}:5555"),
            "127.0.0.1:5555"
        );
        assert_eq!(expand_env_vars("[${SNAPFX_SURELY_UNSET_VAR}]"), "[]");
    }

    #[test]
    fn set_variable_wins() {
        // SAFETY: test-only, no other thread reads this variable.
        unsafe { std::env::set_var("SNAPFX_UTILS_TEST_PORT", "7000") };
        assert_eq!(expand_env_vars("${SNAPFX_UTILS_TEST_PORT:-1}"), "7000");
    }

    #[test]
    fn unterminated_reference_is_kept() {
        assert_eq!(expand_env_vars("a ${B"), "a ${B");
    }
}
