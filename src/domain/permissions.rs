//! Per-resource, per-action access rules.
//!
//! Evaluation happens in two steps. `permits_view` runs before any row is
//! loaded and only looks at the caller's capabilities. `permits_object` runs
//! against a loaded row and additionally checks ownership. Row visibility
//! (which rows a caller may load at all) is separate and expressed by
//! [`Visibility`].

use super::Caller;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Course,
    Lesson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    PartialUpdate,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessRule {
    Public,
    OwnerOnly,
    ModeratorOnly,
    OwnerOrModerator,
    /// Owner check plus "not a moderator"
    OwnerNotModerator,
    NotModerator,
}

/// Row filter applied to owner-scoped queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    OwnedBy(i32),
    Nothing,
}

impl Visibility {
    #[must_use]
    pub fn can_see(&self, owner_id: Option<i32>) -> bool {
        match self {
            Self::All => true,
            Self::OwnedBy(id) => owner_id == Some(*id),
            Self::Nothing => false,
        }
    }
}

#[must_use]
pub const fn rule_for(resource: Resource, action: Action) -> AccessRule {
    match (resource, action) {
        (Resource::Course, Action::Create) => AccessRule::NotModerator,
        (Resource::Lesson, Action::Create) => AccessRule::OwnerNotModerator,
        (_, Action::Destroy) => AccessRule::OwnerOnly,
        _ => AccessRule::OwnerOrModerator,
    }
}

impl AccessRule {
    /// Capability check that does not need the target row.
    ///
    /// Owner checks are deferred to [`AccessRule::permits_object`], so an
    /// owner-based rule passes here for any authenticated caller.
    #[must_use]
    pub const fn permits_view(&self, caller: &Caller) -> bool {
        match self {
            Self::Public | Self::OwnerOnly | Self::OwnerOrModerator => true,
            Self::ModeratorOnly => caller.is_moderator,
            Self::OwnerNotModerator | Self::NotModerator => !caller.is_moderator,
        }
    }

    #[must_use]
    pub fn permits_object(&self, caller: &Caller, owner_id: Option<i32>) -> bool {
        if !self.permits_view(caller) {
            return false;
        }

        match self {
            Self::Public | Self::NotModerator => true,
            Self::ModeratorOnly => caller.is_moderator,
            Self::OwnerOnly | Self::OwnerNotModerator => caller.owns(owner_id),
            Self::OwnerOrModerator => caller.is_moderator || caller.owns(owner_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i32 = 1;
    const OTHER: i32 = 2;

    #[test]
    fn test_rule_table() {
        assert_eq!(
            rule_for(Resource::Course, Action::Create),
            AccessRule::NotModerator
        );
        assert_eq!(
            rule_for(Resource::Course, Action::Destroy),
            AccessRule::OwnerOnly
        );
        for action in [Action::Retrieve, Action::Update, Action::PartialUpdate] {
            assert_eq!(
                rule_for(Resource::Course, action),
                AccessRule::OwnerOrModerator
            );
        }
        assert_eq!(
            rule_for(Resource::Lesson, Action::Create),
            AccessRule::OwnerNotModerator
        );
        assert_eq!(
            rule_for(Resource::Lesson, Action::List),
            AccessRule::OwnerOrModerator
        );
        assert_eq!(
            rule_for(Resource::Lesson, Action::Destroy),
            AccessRule::OwnerOnly
        );
    }

    #[test]
    fn test_moderator_cannot_create() {
        let moderator = Caller::moderator(OTHER);
        let user = Caller::user(OWNER);

        for resource in [Resource::Course, Resource::Lesson] {
            let rule = rule_for(resource, Action::Create);
            assert!(!rule.permits_view(&moderator));
            assert!(rule.permits_view(&user));
        }
    }

    #[test]
    fn test_moderator_reads_and_updates_foreign_rows() {
        let moderator = Caller::moderator(OTHER);

        for action in [Action::Retrieve, Action::Update, Action::PartialUpdate] {
            let rule = rule_for(Resource::Course, action);
            assert!(rule.permits_object(&moderator, Some(OWNER)));
        }
    }

    #[test]
    fn test_only_owner_destroys() {
        let rule = rule_for(Resource::Lesson, Action::Destroy);

        assert!(rule.permits_object(&Caller::user(OWNER), Some(OWNER)));
        assert!(!rule.permits_object(&Caller::user(OTHER), Some(OWNER)));
        assert!(!rule.permits_object(&Caller::moderator(OTHER), Some(OWNER)));
        assert!(!rule.permits_object(&Caller::user(OWNER), None));
    }

    #[test]
    fn test_owner_or_moderator_rejects_strangers() {
        let rule = AccessRule::OwnerOrModerator;

        assert!(rule.permits_object(&Caller::user(OWNER), Some(OWNER)));
        assert!(!rule.permits_object(&Caller::user(OTHER), Some(OWNER)));
    }

    #[test]
    fn test_moderator_only_rule() {
        let rule = AccessRule::ModeratorOnly;

        assert!(rule.permits_view(&Caller::moderator(OTHER)));
        assert!(!rule.permits_view(&Caller::user(OWNER)));
    }

    #[test]
    fn test_visibility_filter() {
        assert!(Visibility::All.can_see(None));
        assert!(Visibility::OwnedBy(OWNER).can_see(Some(OWNER)));
        assert!(!Visibility::OwnedBy(OWNER).can_see(Some(OTHER)));
        assert!(!Visibility::OwnedBy(OWNER).can_see(None));
        assert!(!Visibility::Nothing.can_see(Some(OWNER)));
    }
}
