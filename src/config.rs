/// How an [`Endpoint`](crate::Endpoint) answers an `OPTIONS` request it has no handler for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionsPolicy {
    /// Treat it like any other unregistered method.
    #[default]
    MethodNotAllowed,
    /// Respond `204 No Content` with the `Allow` header, which is enough for CORS preflights.
    /// `OPTIONS` is then also listed in the `Allow` header of every `405` response.
    NoContent,
}

/// Policies applied by an [`Endpoint`](crate::Endpoint).
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) head_fallback: bool,
    pub(crate) options: OptionsPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            head_fallback: true,
            options: OptionsPolicy::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Default::default()
    }

    /// Serve `HEAD` requests with the `GET` handler when no `HEAD` handler is registered.
    /// Enabled by default.
    pub fn head_falls_back_to_get(mut self, enabled: bool) -> Self {
        self.head_fallback = enabled;
        self
    }

    pub fn options_policy(mut self, policy: OptionsPolicy) -> Self {
        self.options = policy;
        self
    }
}
