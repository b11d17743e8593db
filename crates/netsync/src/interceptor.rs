//! # Default Interceptor
//!
//! Bridges one object to a bus. Woven code calls [`NetworkInterceptor`]
//! operations on it and they become `local = true` messages. Inbound
//! `local = false` messages for the object's network name are applied
//! directly to the object.
//!
//! ## Invariants
//! - Applying an inbound change never republishes it. The woven member
//!   re-enters `write_value`/`call_function`, finds the armed echo token and
//!   returns without publishing.
//! - Tokens never outlive the apply that armed them. Calls with the wrong
//!   argument count are rejected before a token is armed.
//! - The alias table and the apply strategy are fixed at construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Weak;

use tracing::debug;
use tracing::warn;

use crate::apply::ApplyMode;
use crate::apply::PropertyApplier;
use crate::bus::Bus;
use crate::bus::BusExt;
use crate::bus::SubscriptionId;
use crate::capability::NetworkInterceptor;
use crate::echo::EchoTable;
use crate::error::Error;
use crate::error::Result;
use crate::message::MethodCallMessage;
use crate::message::PropertyChangeMessage;
use crate::reflect::MethodId;
use crate::reflect::Replicated;
use crate::value::Value;

#[derive(Clone, Debug, Default)]
pub struct InterceptorConfig {
    pub apply_mode: ApplyMode,
}

impl InterceptorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_mode(mut self, mode: ApplyMode) -> Self {
        self.apply_mode = mode;
        self
    }
}

pub struct DefaultInterceptor {
    object_id: String,
    owner: Weak<dyn Replicated>,
    bus: Arc<dyn Bus>,
    applier: Box<dyn PropertyApplier>,
    aliases: HashMap<String, MethodId>,
    echoes: EchoTable,
    property_sub: SubscriptionId,
    call_sub: SubscriptionId,
}

impl DefaultInterceptor {
    /// Binds `owner` to `bus` with the default configuration.
    pub fn new(bus: Arc<dyn Bus>, owner: &Arc<dyn Replicated>) -> Result<Arc<Self>> {
        Self::with_config(bus, owner, InterceptorConfig::default())
    }

    pub fn with_config(bus: Arc<dyn Bus>, owner: &Arc<dyn Replicated>, config: InterceptorConfig) -> Result<Arc<Self>> {
        let descriptor = owner.descriptor();
        let object_id = descriptor.network_name().to_string();
        let aliases = Self::build_aliases(&object_id, owner.as_ref())?;
        let applier = config.apply_mode.build(descriptor);
        let owner = Arc::downgrade(owner);

        debug!(
            "binding interceptor for '{}' ({} aliases, {:?} apply)",
            object_id,
            aliases.len(),
            config.apply_mode
        );

        Ok(Arc::new_cyclic(|this: &Weak<Self>| {
            let weak = this.clone();
            let property_sub = bus.subscribe::<PropertyChangeMessage>(move |msg| match weak.upgrade() {
                Some(this) => this.on_property(msg),
                None => Ok(()),
            });
            let weak = this.clone();
            let call_sub = bus.subscribe::<MethodCallMessage>(move |msg| match weak.upgrade() {
                Some(this) => this.on_call(msg),
                None => Ok(()),
            });

            Self { object_id, owner, bus, applier, aliases, echoes: EchoTable::new(), property_sub, call_sub }
        }))
    }

    fn build_aliases(object_id: &str, owner: &dyn Replicated) -> Result<HashMap<String, MethodId>> {
        let mut aliases = HashMap::new();
        for (i, method) in owner.descriptor().methods.iter().enumerate() {
            let Some(alias) = method.alias() else {
                continue;
            };
            if aliases.insert(alias.to_string(), MethodId(i)).is_some() {
                return Err(Error::DuplicateAlias { object: object_id.to_string(), alias: alias.to_string() });
            }
        }
        Ok(aliases)
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<MethodId> {
        self.aliases.get(alias).copied()
    }

    /// Outstanding echo tokens for one member or alias.
    pub fn pending_echoes(&self, member: &str) -> usize {
        self.echoes.pending(&self.object_id, member)
    }

    /// True when no echo tokens are outstanding.
    pub fn is_quiet(&self) -> bool {
        self.echoes.is_quiet()
    }

    fn on_property(&self, msg: &PropertyChangeMessage) -> Result<()> {
        if msg.local || msg.object_id != self.object_id {
            return Ok(());
        }
        let Some(owner) = self.owner.upgrade() else {
            debug!("owner of '{}' is gone, dropping change to {}", self.object_id, msg.member_id);
            return Ok(());
        };
        if !self.applier.resolves(owner.as_ref(), &msg.member_id) {
            return Err(Error::UnknownProperty { object: self.object_id.clone(), member: msg.member_id.clone() });
        }

        let token = self.echoes.arm(&msg.object_id, &msg.member_id);
        let result = self.applier.apply_property(owner.as_ref(), &msg.member_id, msg.value.clone());
        if self.echoes.disarm(token) && result.is_ok() {
            warn!("applying {}.{} produced no echo", msg.object_id, msg.member_id);
        }
        result
    }

    fn on_call(&self, msg: &MethodCallMessage) -> Result<()> {
        if msg.local || msg.object_id != self.object_id {
            return Ok(());
        }
        let Some(method) = self.resolve_alias(&msg.method_alias) else {
            debug!("no method aliased '{}' on '{}', dropping call", msg.method_alias, self.object_id);
            return Ok(());
        };
        let Some(owner) = self.owner.upgrade() else {
            debug!("owner of '{}' is gone, dropping call to {}", self.object_id, msg.method_alias);
            return Ok(());
        };
        let arity = owner.descriptor().method(method).map_or(0, |m| m.arity);
        if msg.arguments.len() != arity {
            return Err(Error::ArgumentMismatch {
                operation: msg.method_alias.clone(),
                details: format!("expected {} arguments, got {}", arity, msg.arguments.len()),
            });
        }

        let token = self.echoes.arm(&msg.object_id, &msg.method_alias);
        let result = owner.invoke(method, &msg.arguments);
        if self.echoes.disarm(token) && result.is_ok() {
            warn!("calling {}.{} produced no echo", msg.object_id, msg.method_alias);
        }
        result.map(|_| ())
    }
}

impl NetworkInterceptor for DefaultInterceptor {
    fn write_value(&self, object: &str, member: &str, value: Value) -> Result<()> {
        if self.echoes.consume(object, member) {
            return Ok(());
        }
        debug!("intercepted: {}.{} = {}", object, member, value);
        self.bus.trigger(PropertyChangeMessage::local(object, member, value))
    }

    fn call_function(&self, object: &str, alias: &str, arguments: Vec<Value>) -> Result<()> {
        if self.echoes.consume(object, alias) {
            return Ok(());
        }
        debug!("intercepted: {}.{}({} args)", object, alias, arguments.len());
        self.bus.trigger(MethodCallMessage::local(object, alias, arguments))
    }
}

impl Drop for DefaultInterceptor {
    fn drop(&mut self) {
        self.bus.unsubscribe::<PropertyChangeMessage>(self.property_sub);
        self.bus.unsubscribe::<MethodCallMessage>(self.call_sub);
    }
}
