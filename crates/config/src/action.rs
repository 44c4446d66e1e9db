use crate::context::DeclarationInfo;
use crate::error::ConfigError;
use crate::lifecycle::ConfigContext;
use std::fmt;
use std::sync::Arc;

/// Identifies the configuration slot an action affects. Equal keys compete.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConflictKey(Vec<String>);

impl ConflictKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Appends one more part.
    #[must_use]
    pub fn with(mut self, part: impl Into<String>) -> Self {
        self.0.push(part.into());
        self
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for ConflictKey {
    fn from(parts: [S; N]) -> Self {
        Self::new(parts)
    }
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Lazily computed key, evaluated once per resolution.
pub type ComputeKey = Arc<dyn Fn(&DeclarationInfo) -> ConflictKey + Send + Sync>;

/// Deferred configuration side effect.
pub type Payload = Arc<dyn Fn(&ConfigContext) -> Result<(), ConfigError> + Send + Sync>;

#[derive(Clone, Default)]
pub enum Discriminator {
    /// Never conflicts with anything.
    #[default]
    None,
    Direct(ConflictKey),
    Computed(ComputeKey),
}

impl Discriminator {
    pub fn computed(
        compute: impl Fn(&DeclarationInfo) -> ConflictKey + Send + Sync + 'static,
    ) -> Self {
        Self::Computed(Arc::new(compute))
    }

    #[must_use]
    pub fn evaluate(&self, info: &DeclarationInfo) -> Option<ConflictKey> {
        match self {
            Self::None => None,
            Self::Direct(key) => Some(key.clone()),
            Self::Computed(compute) => Some(compute(info)),
        }
    }
}

impl fmt::Debug for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Direct(key) => f.debug_tuple("Direct").field(key).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<ConflictKey> for Discriminator {
    fn from(key: ConflictKey) -> Self {
        Self::Direct(key)
    }
}

/// One declared configuration side effect plus its declaration metadata.
///
/// Actions are immutable once built; the resolver consumes them.
#[derive(Clone)]
pub struct Action {
    discriminator: Discriminator,
    order: Option<i64>,
    info: DeclarationInfo,
    payload: Payload,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("discriminator", &self.discriminator)
            .field("order", &self.order)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Action {
    pub fn new(
        discriminator: impl Into<Discriminator>,
        info: DeclarationInfo,
        payload: impl Fn(&ConfigContext) -> Result<(), ConfigError> + Send + Sync + 'static,
    ) -> Self {
        Self { discriminator: discriminator.into(), order: None, info, payload: Arc::new(payload) }
    }

    /// Explicit position in the execution order, instead of the declaration index.
    #[must_use]
    pub const fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    #[must_use]
    pub const fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    #[must_use]
    pub const fn order(&self) -> Option<i64> {
        self.order
    }

    #[must_use]
    pub const fn info(&self) -> &DeclarationInfo {
        &self.info
    }

    pub(crate) fn into_parts(self) -> (Discriminator, Option<i64>, DeclarationInfo, Payload) {
        (self.discriminator, self.order, self.info, self.payload)
    }
}

/// A conflict-free action in its final execution position.
#[derive(Clone)]
pub struct ResolvedAction {
    key: Option<ConflictKey>,
    info: DeclarationInfo,
    payload: Payload,
}

impl fmt::Debug for ResolvedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAction")
            .field("key", &self.key)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl ResolvedAction {
    pub(crate) const fn new(key: Option<ConflictKey>, info: DeclarationInfo, payload: Payload) -> Self {
        Self { key, info, payload }
    }

    /// The evaluated key, `None` for actions that never conflict.
    #[must_use]
    pub const fn key(&self) -> Option<&ConflictKey> {
        self.key.as_ref()
    }

    #[must_use]
    pub const fn info(&self) -> &DeclarationInfo {
        &self.info
    }

    /// Label used in logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        self.key.as_ref().map_or_else(
            || format!("<unkeyed {}>", self.info.location()),
            ToString::to_string,
        )
    }

    /// Runs the payload.
    ///
    /// # Errors
    /// Returns whatever the payload returns.
    pub fn run(&self, ctx: &ConfigContext) -> Result<(), ConfigError> {
        (self.payload)(ctx)
    }
}
