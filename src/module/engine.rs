//! Invocation engine
//!
//! Resolves a member name against the catalog, picks the overload by
//! argument count, resolves the owning module to a registered host handle
//! and runs the matching trampoline.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::module::api::events::{DiagnosticEvent, EventManager};
use crate::module::loader::cache::HandleCache;
use crate::module::loader::host::{panic_error, ConstructorHandle, HostModules, ModuleHandle, TypeHandle};
use crate::module::metadata::{MemberRecord, TypeRecord};
use crate::module::registry::catalog::Catalog;
use crate::module::suggest::suggest_names;
use crate::module::traits::{ModuleError, ModuleResult};
use crate::module::value::{is_primitive_type, Instance, Value};
use crate::utils::ensure_not_blank;

/// Dynamic invocation engine
pub struct Engine {
    catalog: Arc<Catalog>,
    hosts: Arc<HostModules>,
    cache: HandleCache,
    config: EngineConfig,
    events: EventManager,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, hosts: Arc<HostModules>, config: EngineConfig) -> Self {
        Self {
            catalog,
            hosts,
            cache: HandleCache::new(),
            config,
            events: EventManager::new(),
        }
    }

    /// Publish resolution and invocation diagnostics through `events`
    pub fn with_events(mut self, events: EventManager) -> Self {
        self.events = events;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn hosts(&self) -> &Arc<HostModules> {
        &self.hosts
    }

    /// Invoke the member called `name` whose arity equals `args.len()`
    ///
    /// Async members return `Value::Pending`; await it with
    /// `PendingValue::wait` or use `invoke_by_name_async`.
    pub fn invoke_by_name(&self, name: &str, args: &[Value], instance: Option<&Instance>) -> ModuleResult<Value> {
        let member = self.select_member(name, args.len())?;
        self.invoke_member(&member, args, instance)
    }

    /// Invoke a member chosen by the caller, skipping name lookup
    pub fn invoke_by_name_with_descriptor(
        &self,
        member: &MemberRecord,
        args: &[Value],
        instance: Option<&Instance>,
    ) -> ModuleResult<Value> {
        if member.arity() != args.len() {
            return Err(ModuleError::OverloadMismatch {
                name: member.qualified_name(),
                arg_count: args.len(),
                candidates: vec![member.signature()],
            });
        }
        self.invoke_member(member, args, instance)
    }

    /// Invoke an async member and await its result
    pub async fn invoke_by_name_async(
        &self,
        name: &str,
        args: &[Value],
        instance: Option<&Instance>,
    ) -> ModuleResult<Value> {
        self.invoke_by_name_async_with_cancellation(name, args, instance, &CancellationToken::new())
            .await
    }

    /// Invoke an async member, giving up with `Cancelled` when `token` fires
    ///
    /// Cancellation stops waiting; the pending work is dropped with it.
    pub async fn invoke_by_name_async_with_cancellation(
        &self,
        name: &str,
        args: &[Value],
        instance: Option<&Instance>,
        token: &CancellationToken,
    ) -> ModuleResult<Value> {
        let member = self.select_member(name, args.len())?;
        if !member.flags.is_async {
            return Err(ModuleError::NotAsync(member.signature()));
        }

        let Value::Pending(pending) = self.invoke_member(&member, args, instance)? else {
            return Err(ModuleError::NotAsync(member.signature()));
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Invocation of {} cancelled", member.signature());
                Err(ModuleError::Cancelled(member.signature()))
            }
            outcome = pending.wait() => outcome.map_err(|e| self.report(e)),
        }
    }

    /// Construct an instance of the type named `type_name`
    ///
    /// Exactly one public constructor must accept `args`.
    pub fn create_instance(&self, type_name: &str, args: &[Value]) -> ModuleResult<Instance> {
        let type_name = ensure_not_blank(type_name, "type name")?;
        let record = self.select_type(type_name)?;
        let handle = self.resolve_handle(&record.module_id)?;
        let ty = find_type(&handle, &record.full_name)?;

        let attempted: Vec<String> = args.iter().map(|a| a.type_name().to_string()).collect();
        let matching: Vec<&ConstructorHandle> = ty
            .constructors
            .iter()
            .filter(|ctor| ctor.is_public && ctor.accepts(args))
            .collect();

        let ctor = match matching.as_slice() {
            [ctor] => *ctor,
            [] => {
                return Err(ModuleError::ConstructionFailed {
                    type_name: ty.full_name.clone(),
                    reason: "no public constructor accepts the supplied arguments".to_string(),
                    attempted,
                    declared: ty.constructor_signatures(),
                })
            }
            several => {
                return Err(ModuleError::ConstructionFailed {
                    type_name: ty.full_name.clone(),
                    reason: format!(
                        "{} public constructors accept the supplied arguments",
                        several.len()
                    ),
                    attempted,
                    declared: ty.constructor_signatures(),
                })
            }
        };

        let signature = ctor.signature(&ty.full_name);
        match catch_unwind(AssertUnwindSafe(|| ctor.construct(args))) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(cause)) => Err(self.report(ModuleError::invocation_failed(signature, cause))),
            Err(payload) => Err(self.report(ModuleError::invocation_failed(
                signature,
                panic_error(payload),
            ))),
        }
    }

    /// Drop the cached handle of `module_id`
    ///
    /// Handles are cached by module id only. Callers that re-add a module
    /// whose artifacts changed should evict it so the next call resolves
    /// the handle again.
    pub fn evict(&self, module_id: &str) -> bool {
        self.cache.evict(module_id)
    }

    /// Drop every cached handle; returns how many were dropped
    pub fn clear_handles(&self) -> usize {
        let dropped = self.cache.clear();
        debug!("Cleared {} cached module handles", dropped);
        dropped
    }

    pub fn cached_handles(&self) -> usize {
        self.cache.len()
    }

    /// First member named `name` with `arg_count` parameters, in catalog order
    fn select_member(&self, name: &str, arg_count: usize) -> ModuleResult<MemberRecord> {
        let name = ensure_not_blank(name, "member name")?;
        let candidates: Vec<MemberRecord> = self.catalog.find_members_by_name(name)?.collect();

        if candidates.is_empty() {
            return Err(ModuleError::MemberNotFound {
                name: name.to_string(),
                scope: None,
                suggestions: self.suggest(name, self.catalog.member_names()),
            });
        }

        match candidates.iter().find(|m| m.arity() == arg_count) {
            Some(member) => Ok(member.clone()),
            None => Err(ModuleError::OverloadMismatch {
                name: name.to_string(),
                arg_count,
                candidates: candidates.iter().map(MemberRecord::signature).collect(),
            }),
        }
    }

    /// Type record for `name`, preferring an exact full-name match
    fn select_type(&self, name: &str) -> ModuleResult<TypeRecord> {
        let mut found = self.catalog.find_types_by_name(name)?;
        if found.is_empty() {
            return Err(ModuleError::TypeNotFound {
                name: name.to_string(),
                suggestions: self.suggest(name, self.catalog.type_names()),
            });
        }
        let index = found
            .iter()
            .position(|ty| ty.full_name.eq_ignore_ascii_case(name))
            .unwrap_or(0);
        Ok(found.swap_remove(index))
    }

    /// Resolve, check and run `member`
    fn invoke_member(&self, member: &MemberRecord, args: &[Value], instance: Option<&Instance>) -> ModuleResult<Value> {
        let handle = self.resolve_handle(&member.module_id)?;
        let ty = find_type(&handle, &member.owner_type)?;
        self.resolve_parameter_types(member, &handle)?;

        let parameter_types = member.parameter_types();
        let method = ty
            .find_method(&member.name, member.flags.is_static, &parameter_types)
            .ok_or_else(|| ModuleError::MemberNotFound {
                name: member.signature(),
                scope: Some(ty.full_name.clone()),
                suggestions: ty.method_signatures(),
            })?;

        match (method.is_static, instance) {
            (false, None) => return Err(ModuleError::InstanceRequired(member.signature())),
            (true, Some(_)) => return Err(ModuleError::UnexpectedInstance(member.signature())),
            (false, Some(instance)) if !instance.type_name().eq_ignore_ascii_case(&ty.full_name) => {
                return Err(ModuleError::Validation(format!(
                    "instance of {} cannot receive {}",
                    instance.type_name(),
                    member.signature()
                )));
            }
            _ => {}
        }
        check_arguments(member, args)?;

        debug!("Invoking {}", member.signature());
        match catch_unwind(AssertUnwindSafe(|| method.call(&ty.full_name, instance, args))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(cause)) => Err(self.report(ModuleError::invocation_failed(member.signature(), cause))),
            Err(payload) => Err(self.report(ModuleError::invocation_failed(
                member.signature(),
                panic_error(payload),
            ))),
        }
    }

    /// Cached handle for `module_id`, resolving it on first use
    fn resolve_handle(&self, module_id: &str) -> ModuleResult<Arc<ModuleHandle>> {
        if let Some(handle) = self.cache.get(module_id) {
            return Ok(handle);
        }

        let artifacts = self
            .catalog
            .get_by_id(module_id)?
            .map(|record| record.artifacts.clone())
            .unwrap_or_default();
        let found = std::iter::once(module_id)
            .chain(artifacts.iter().map(String::as_str))
            .find_map(|name| self.hosts.find(name));

        let Some(found) = found else {
            warn!("Module {} has no registered host handle", module_id);
            return Err(ModuleError::ModuleNotResolved {
                module_id: module_id.to_string(),
                known: self.catalog.known_modules(),
            });
        };

        let (handle, inserted) = self.cache.insert_if_absent(module_id, found);
        if inserted {
            info!("Resolved module {} to host handle {}", module_id, handle.name);
            self.events.publish(DiagnosticEvent::HandleResolved {
                module_id: module_id.to_string(),
                handle: handle.name.clone(),
            });
        }
        Ok(handle)
    }

    /// Every parameter type must be a primitive or a registered type
    fn resolve_parameter_types(&self, member: &MemberRecord, handle: &ModuleHandle) -> ModuleResult<()> {
        for parameter in &member.parameters {
            let type_name = parameter.type_name.trim().trim_end_matches('?');
            if is_primitive_type(type_name)
                || handle.find_type(type_name).is_some()
                || self.hosts.contains_type(type_name)
            {
                continue;
            }
            return Err(ModuleError::ParameterTypeNotFound {
                member: member.signature(),
                parameter: parameter.name.clone(),
                type_name: parameter.type_name.clone(),
            });
        }
        Ok(())
    }

    /// Nearby names, or a short list of known names when none is close
    fn suggest(&self, query: &str, names: Vec<String>) -> Vec<String> {
        let nearby = suggest_names(
            query,
            &names,
            self.config.max_suggestions,
            self.config.max_edit_distance,
        );
        if nearby.is_empty() {
            names.into_iter().take(self.config.fallback_hint_count).collect()
        } else {
            nearby
        }
    }

    /// Log and publish an invocation failure, passing the error through
    fn report(&self, error: ModuleError) -> ModuleError {
        if let ModuleError::InvocationFailed { member, source } = &error {
            warn!("Invocation of {} failed: {}", member, source);
            self.events.publish(DiagnosticEvent::InvocationFailed {
                member: member.clone(),
                error: source.to_string(),
            });
        }
        error
    }
}

fn find_type<'a>(handle: &'a ModuleHandle, full_name: &str) -> ModuleResult<&'a TypeHandle> {
    handle
        .find_type(full_name)
        .ok_or_else(|| ModuleError::TypeNotFound {
            name: full_name.to_string(),
            suggestions: handle.type_names(),
        })
}

/// Arguments must be assignable to the declared parameter types
fn check_arguments(member: &MemberRecord, args: &[Value]) -> ModuleResult<()> {
    for (position, (parameter, arg)) in member.parameters.iter().zip(args).enumerate() {
        if !arg.is_assignable_to(&parameter.type_name) {
            return Err(ModuleError::Validation(format!(
                "argument {} ('{}') of {} expects {}, got {}",
                position + 1,
                parameter.name,
                member.qualified_name(),
                parameter.type_name,
                arg.type_name()
            )));
        }
    }
    Ok(())
}
