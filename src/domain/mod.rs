//! Domain primitives shared by the store, services and HTTP layer.
//!
//! The caller identity is resolved once per request (user id plus the
//! moderator capability) and passed explicitly into permission checks and
//! visibility-scoped queries.

pub mod permissions;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use permissions::{AccessRule, Action, Resource, Visibility, rule_for};

/// Authenticated identity attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    pub user_id: i32,
    pub is_moderator: bool,
}

impl Caller {
    #[must_use]
    pub const fn user(user_id: i32) -> Self {
        Self {
            user_id,
            is_moderator: false,
        }
    }

    #[must_use]
    pub const fn moderator(user_id: i32) -> Self {
        Self {
            user_id,
            is_moderator: true,
        }
    }

    /// Rows this caller may see in owner-scoped listings.
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        if self.is_moderator {
            Visibility::All
        } else {
            Visibility::OwnedBy(self.user_id)
        }
    }

    #[must_use]
    pub fn owns(&self, owner_id: Option<i32>) -> bool {
        owner_id == Some(self.user_id)
    }
}

/// Visibility for an optional caller. Anonymous callers see nothing.
#[must_use]
pub fn visibility_for(caller: Option<&Caller>) -> Visibility {
    caller.map_or(Visibility::Nothing, Caller::visibility)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "transfer" => Ok(Self::Transfer),
            other => Err(format!("\"{other}\" is not a valid choice.")),
        }
    }
}

/// Field-level validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.request.page.saturating_mul(self.request.page_size) < self.total
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.request.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }
}

/// Which branch of a subscription toggle fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionToggle {
    Added,
    Removed,
}

impl SubscriptionToggle {
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Added => "Подписка добавлена",
            Self::Removed => "Подписка удалена",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_for_callers() {
        assert_eq!(visibility_for(None), Visibility::Nothing);
        assert_eq!(
            visibility_for(Some(&Caller::user(7))),
            Visibility::OwnedBy(7)
        );
        assert_eq!(visibility_for(Some(&Caller::moderator(7))), Visibility::All);
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>(), Ok(PaymentMethod::Cash));
        assert_eq!(
            "transfer".parse::<PaymentMethod>(),
            Ok(PaymentMethod::Transfer)
        );
        assert!("card".parse::<PaymentMethod>().is_err());
        assert_eq!(PaymentMethod::Transfer.to_string(), "transfer");
    }

    #[test]
    fn test_field_errors_collects_per_field() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("title", "This field is required.");
        errors.add("title", "Second.");
        errors.add("link_to_video", "Bad host.");

        assert_eq!(errors.get("title").map(<[String]>::len), Some(2));
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["link_to_video"][0], "Bad host.");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_page_navigation() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
            request: PageRequest {
                page: 2,
                page_size: 2,
            },
        };
        assert!(page.has_next());
        assert!(page.has_previous());

        let last = Page {
            items: vec![5],
            total: 5,
            request: PageRequest {
                page: 3,
                page_size: 2,
            },
        };
        assert!(!last.has_next());
        assert_eq!(last.map(|n| n * 10).items, vec![50]);
    }

    #[test]
    fn test_toggle_messages() {
        assert_eq!(SubscriptionToggle::Added.message(), "Подписка добавлена");
        assert_eq!(SubscriptionToggle::Removed.message(), "Подписка удалена");
    }
}
