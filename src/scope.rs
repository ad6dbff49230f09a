use std::borrow::{Borrow, Cow};
use std::collections::{btree_set, BTreeSet};
use std::fmt;
use std::str::FromStr;

mod serde;

/// A single OAuth2 scope string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    pub const PREFIX: &'static str = "https://www.googleapis.com/auth/";

    pub const fn from_static(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Scope {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("scope must not be empty");
        }
        if s.contains(char::is_whitespace) {
            return Err("scope must not contain whitespace");
        }
        Ok(Self(Cow::Owned(s.to_string())))
    }
}

impl AsRef<str> for Scope {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for Scope {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

macro_rules! scope {
    { $(
        $( #[$m:meta] )*
        $i0:ident $(. $i:ident)* ;
    )+ } => { ::paste::paste! {
        impl Scope { $(
            $( #[$m] )*
            pub const [< $i0:upper $( _ $i:upper )* >]: Scope = Scope::from_static(concat!(
                "https://www.googleapis.com/auth/",
                stringify!($i0)
                $(, ".", stringify!($i))*
            ));
        )+ }

        pub const ALL_CALENDAR_SCOPES: &[Scope] = &[ $(
            Scope::[< $i0:upper $( _ $i:upper )* >]
        ),+ ];
    } };
}

// https://developers.google.com/identity/protocols/oauth2/scopes#calendar
scope! {
    /// See, edit, share, and permanently delete all the calendars.
    calendar;
    /// See and download any calendar.
    calendar.readonly;
    calendar.events;
    calendar.events.readonly;
    calendar.settings.readonly;
    calendar.addons.execute;
}

/// The set of scopes requested from, and granted by, the provider.
///
/// Rendered as the space-delimited string OAuth2 uses on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains<S>(&self, scope: &S) -> bool
    where
        S: AsRef<str> + ?Sized,
    {
        self.0.contains(scope.as_ref())
    }

    pub fn with(mut self, scope: Scope) -> Self {
        self.0.insert(scope);
        self
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Scope> {
        self.0.iter()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        let Some(first) = iter.next() else {
            return Ok(());
        };
        write!(f, "{first}")?;
        for s in iter {
            write!(f, " {s}")?;
        }
        Ok(())
    }
}

impl FromStr for ScopeSet {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace().map(str::parse).collect()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = Scope>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Scope; N]> for ScopeSet {
    fn from(value: [Scope; N]) -> Self {
        value.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a Scope;
    type IntoIter = btree_set::Iter<'a, Scope>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for ScopeSet {
    type Item = Scope;
    type IntoIter = btree_set::IntoIter<Scope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// ```
/// let scopes = calendar_refresh_token::scope_set![calendar.readonly];
/// assert_eq!(scopes.len(), 1);
/// ```
#[macro_export]
macro_rules! scope_set {
    [
        $( $i0:ident $(. $i:ident)* ),*
        $(,)?
    ] => { ::paste::paste! {
        [ $(
            $crate::scope::Scope::[< $i0:upper $( _ $i:upper )* >]
        ),* ]
        .into_iter()
        .collect::<$crate::scope::ScopeSet>()
    } };
}
