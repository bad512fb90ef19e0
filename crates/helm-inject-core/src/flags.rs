//! Flag chains for the wrapped commands
//!
//! A [`FlagChain`] is an ordered list of command-line arguments built from
//! flag names and values. Single-character names use short syntax (`-f`),
//! longer names use long syntax (`--set`). An empty value produces a bare
//! switch, which is how boolean flags are expressed.
//!
//! ```
//! use helm_inject_core::FlagChain;
//!
//! let chain = FlagChain::new().flag("set", ["a=1", "b=2"]).switch("i", true);
//! assert_eq!(chain.to_string(), " --set a=1 --set b=2 -i");
//! ```

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagChain {
    args: Vec<String>,
}

/// Dash prefix for a flag name
fn dashes(name: &str) -> &'static str {
    if name.chars().count() == 1 { "-" } else { "--" }
}

impl FlagChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `name` per value
    ///
    /// Empty values add the flag without an argument.
    pub fn flag<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            let value = value.as_ref();
            self.args.push(format!("{}{}", dashes(name), name));
            if !value.is_empty() {
                self.args.push(value.to_string());
            }
        }
        self
    }

    /// Add `name value` when a value is present
    pub fn optional(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.flag(name, [value]),
            _ => self,
        }
    }

    /// Add a bare `name` switch when `enabled`
    pub fn switch(self, name: &str, enabled: bool) -> Self {
        if enabled { self.flag(name, [""]) } else { self }
    }

    /// Append another chain after this one
    pub fn chain(mut self, other: FlagChain) -> Self {
        self.args.extend(other.args);
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Renders the chain as it would be appended to a command line
impl fmt::Display for FlagChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
