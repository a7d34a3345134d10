/// Result of a guarded operation.
///
/// A missing record, a record the user cannot see and a record the user may
/// not modify all produce `Denied`, so nothing about the record leaks.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Ok(T),
    Denied,
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Outcome::Denied)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Denied => Outcome::Denied,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Denied => None,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Ok(value),
            None => Outcome::Denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_conversions() {
        let found: Outcome<i32> = Some(3).into();
        assert!(found.is_ok());
        assert_eq!(found.map(|v| v * 2).ok(), Some(6));

        let missing: Outcome<i32> = None.into();
        assert!(missing.is_denied());
        assert_eq!(missing.ok(), None);
    }
}
