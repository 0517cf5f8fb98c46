use crate::consumers::{
    handler::{AsyncClosure, ClosureHandler},
    hooks::before_request::MaxMessages,
    poller::QueuePoller,
    BeforeRequestHook, Handler, Notifier, PollerConfig, PollerError, ResourceScope,
    TracingNotifier,
};
use crate::queue::QueueClient;
use std::sync::Arc;

/// A builder to compose a [`QueuePoller`] with a fluent API.
///
/// Use [`QueuePoller::builder`] as entrypoint.
pub struct QueuePollerBuilder<Context>
where
    Context: Send + Sync + 'static,
{
    config: PollerConfig,
    client: Arc<dyn QueueClient>,
    context: Arc<Context>,
    notifier: Option<Arc<dyn Notifier>>,
    before_request_hooks: Vec<Arc<dyn BeforeRequestHook>>,
    resource_scope: Option<Arc<dyn ResourceScope>>,
}

impl<Context> QueuePollerBuilder<Context>
where
    Context: Send + Sync + 'static,
{
    pub(crate) fn new(
        config: PollerConfig,
        client: Arc<dyn QueueClient>,
        context: Arc<Context>,
    ) -> Self {
        Self {
            config,
            client,
            context,
            notifier: None,
            before_request_hooks: vec![],
            resource_scope: None,
        }
    }

    /// The notifier receiving log lines and failure reports.
    ///
    /// If not configured, the poller creates its own [`TracingNotifier`] with a random tag.
    #[must_use]
    pub fn with_notifier<N: Notifier>(self, notifier: N) -> Self {
        self.with_dyn_notifier(Arc::new(notifier))
    }

    /// A version of [`QueuePollerBuilder::with_notifier`] for already Arc-ed notifiers.
    ///
    /// Useful to share the same notifier across pollers.
    #[must_use]
    pub fn with_dyn_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Before-request hooks are executed before every receive request, in the order they are
    /// registered, and can stop the polling loop.
    ///
    /// Check out [`BeforeRequestHook`](crate::consumers::BeforeRequestHook)'s documentation
    /// for more details.
    ///
    /// If [`PollerConfig::max_messages`] is set, a [`MaxMessages`] hook is registered ahead of
    /// the hooks you add here.
    #[must_use]
    pub fn with_before_request_hook<H: BeforeRequestHook>(mut self, hook: H) -> Self {
        self.before_request_hooks.push(Arc::new(hook));
        self
    }

    /// Append multiple before-request hooks, see
    /// [`QueuePollerBuilder::with_before_request_hook`].
    #[must_use]
    pub fn with_before_request_hooks<I>(mut self, hooks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn BeforeRequestHook>>,
    {
        self.before_request_hooks.extend(hooks);
        self
    }

    /// The resource acquired once per `poll` when [`PollerConfig::connection_pool_scope`] is
    /// enabled.
    ///
    /// Check out [`ResourceScope`](crate::consumers::ResourceScope)'s documentation for more
    /// details.
    #[must_use]
    pub fn with_resource_scope<S: ResourceScope>(self, scope: S) -> Self {
        self.with_dyn_resource_scope(Arc::new(scope))
    }

    /// A version of [`QueuePollerBuilder::with_resource_scope`] for already Arc-ed scopes.
    #[must_use]
    pub fn with_dyn_resource_scope(mut self, scope: Arc<dyn ResourceScope>) -> Self {
        self.resource_scope = Some(scope);
        self
    }

    /// The handler function used to process incoming messages.
    ///
    /// Passing in the handler finalises the `QueuePoller` construction: the configuration is
    /// validated and you will not be able to register additional hooks.
    ///
    /// # Scope
    ///
    /// The function does not get access to the queue client.
    /// The poller deletes the message when the handler succeeds and leaves it on the queue
    /// otherwise.
    pub fn handler<H>(self, handler: H) -> Result<QueuePoller<Context>, PollerError>
    where
        H: AsyncClosure<Context>,
    {
        self.raw_handler(ClosureHandler(handler))
    }

    /// The raw handler used to process incoming messages. Prefer `handler` if you
    /// only want to register a function handler.
    ///
    /// Check out [`Handler`]'s documentation for more details.
    pub fn raw_handler<H: Handler<Context>>(
        self,
        handler: H,
    ) -> Result<QueuePoller<Context>, PollerError> {
        self.raw_arc_handler(Arc::new(handler))
    }

    /// The raw Arc<handler> used to process incoming messages. Prefer `handler` if you
    /// only want to register a function handler.
    ///
    /// # Errors
    ///
    /// [`PollerError::InvalidConfiguration`] if the queue endpoint is missing, the batch size is
    /// zero, or `connection_pool_scope` is enabled without a resource scope.
    pub fn raw_arc_handler(
        self,
        handler: Arc<dyn Handler<Context>>,
    ) -> Result<QueuePoller<Context>, PollerError> {
        let Self {
            config,
            client,
            context,
            notifier,
            before_request_hooks,
            resource_scope,
        } = self;

        config.validate()?;

        let resource_scope = match (config.connection_pool_scope, resource_scope) {
            (true, Some(scope)) => Some(scope),
            (true, None) => {
                return Err(PollerError::InvalidConfiguration(
                    "`connection_pool_scope` is enabled but no resource scope was provided."
                        .into(),
                ))
            }
            (false, Some(_)) => {
                tracing::warn!(
                    queue_endpoint = %config.queue_endpoint,
                    "A resource scope was provided but `connection_pool_scope` is disabled: \
                     it will not be used."
                );
                None
            }
            (false, None) => None,
        };

        let before_request_hooks = config
            .max_messages
            .map(|max| Arc::new(MaxMessages(max)) as Arc<dyn BeforeRequestHook>)
            .into_iter()
            .chain(before_request_hooks)
            .collect();

        let notifier =
            notifier.unwrap_or_else(|| Arc::new(TracingNotifier::with_random_tag()));

        Ok(QueuePoller {
            config,
            client,
            context,
            handler,
            notifier,
            before_request_hooks,
            resource_scope,
        })
    }
}
