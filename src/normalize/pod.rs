use std::sync::LazyLock;

use regex::Regex;

/// Matches post-operative/hospital day notation in its many written forms:
/// `POD 3`, `POD#3`, `POD-3`, `pod3`, `HD 3`, `hospital day 3`. Captures the
/// day number for rewriting to the canonical `POD#<n>` form.
static POD_VARIANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pod|hd|post[- ]?op(?:erative)? day|hospital day)\s*[#\-]?\s*(\d{1,3})\b").unwrap()
});

/// Rewrites every post-operative/hospital-day reference to `POD#<n>`.
/// Hospital-day (`HD`) references are folded into the same notation since
/// the Temporal Analyzer resolves both relative to the same anchor search
/// (surgery date first, admission date as fallback context only — actual
/// resolution happens downstream, normalization only standardizes the
/// written form).
pub fn canonicalize_pod(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for caps in POD_VARIANT.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let day = &caps[1];
        out.push_str(&text[cursor..whole.start()]);
        out.push_str("POD#");
        out.push_str(day);
        cursor = whole.end();
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_form_left_as_is() {
        assert_eq!(canonicalize_pod("Developed vasospasm on POD#3."), "Developed vasospasm on POD#3.");
    }

    #[test]
    fn space_form_rewritten() {
        assert_eq!(canonicalize_pod("Developed vasospasm on POD 3."), "Developed vasospasm on POD#3.");
    }

    #[test]
    fn hospital_day_rewritten() {
        assert_eq!(canonicalize_pod("Afebrile on HD 5."), "Afebrile on POD#5.");
    }

    #[test]
    fn verbose_form_rewritten() {
        assert_eq!(
            canonicalize_pod("Tolerating diet on post-operative day 2."),
            "Tolerating diet on POD#2."
        );
    }

    #[test]
    fn idempotent() {
        let text = "POD 3 course was uneventful, continued through POD#4.";
        let once = canonicalize_pod(text);
        let twice = canonicalize_pod(&once);
        assert_eq!(once, twice);
    }
}
