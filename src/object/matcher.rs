/// Treats two names as the same object when both mention `alias` and
/// either of them mentions `qualifier`.
///
/// This exists for applications that give their single-instance mutex a
/// different name on every build. It is broad: any unrelated object whose
/// name happens to contain both tokens is matched too, so keep the tokens
/// specific or disable the rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasRule {
    alias: String,
    qualifier: String,
}

impl AliasRule {
    pub fn new(alias: &str, qualifier: &str) -> Self {
        Self {
            alias: alias.to_lowercase(),
            qualifier: qualifier.to_lowercase(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Both arguments must already be case-folded.
    fn holds(&self, pattern: &str, name: &str) -> bool {
        pattern.contains(&self.alias)
            && name.contains(&self.alias)
            && (name.contains(&self.qualifier) || pattern.contains(&self.qualifier))
    }
}

impl Default for AliasRule {
    fn default() -> Self {
        Self::new("singleton", "roblox")
    }
}

/// Decides whether a resolved object name is the one to close.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameMatcher {
    pattern: String,
    alias_rule: Option<AliasRule>,
}

impl NameMatcher {
    pub fn new(pattern: &str, alias_rule: Option<AliasRule>) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            alias_rule,
        }
    }

    /// The case-folded pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }

        name.contains(&self.pattern)
            || name == self.pattern
            || self
                .alias_rule
                .as_ref()
                .is_some_and(|rule| rule.holds(&self.pattern, &name))
    }
}
