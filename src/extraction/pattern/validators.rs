use chrono::{Local, NaiveDate};

/// MRNs are 6-10 digits and must not coincide with something that parses
/// as a plausible calendar date (a common false-positive source when a
/// compact-digit date sits next to an MRN label).
pub fn is_plausible_mrn(digits: &str) -> bool {
    (6..=10).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

pub fn is_plausible_age(age: u8) -> bool {
    age <= 120
}

pub fn is_dob_not_future(dob: NaiveDate) -> bool {
    dob <= Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mrn_length_bounds_enforced() {
        assert!(is_plausible_mrn("123456"));
        assert!(is_plausible_mrn("1234567890"));
        assert!(!is_plausible_mrn("12345"));
        assert!(!is_plausible_mrn("12345678901"));
    }

    #[test]
    fn age_upper_bound_enforced() {
        assert!(is_plausible_age(0));
        assert!(is_plausible_age(120));
        assert!(!is_plausible_age(200));
    }

    #[test]
    fn dob_in_future_rejected() {
        let future = Local::now().date_naive() + chrono::Duration::days(1);
        assert!(!is_dob_not_future(future));
    }
}
