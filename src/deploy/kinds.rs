//! Per-kind upsert dispatch: one resolved config to one remote object.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};

use crate::api;
use crate::client::{ClientSet, PlatformClients, SettingsObject, UpsertOutcome};
use crate::model::{
    Config, ConfigType, PROP_ID, PROP_NAME, PROP_SCOPE, Parameter, ResolvedEntity,
};

use super::resolver::ResolvedConfig;

/// Deploy one resolved config through the matching client.
///
/// Returns the entity recorded in the resolution context; `properties["id"]`
/// always carries the platform-assigned (or stable) id.
pub(super) fn deploy_resolved(
    config: &Config,
    resolved: &ResolvedConfig,
    clients: &ClientSet,
) -> Result<ResolvedEntity> {
    let outcome = match &config.type_ {
        ConfigType::ClassicApi { api, .. } => deploy_classic(config, resolved, clients, api)?,
        ConfigType::Settings {
            schema_id,
            schema_version,
            ..
        } => deploy_settings(config, resolved, clients, schema_id, schema_version.as_deref())?,
        ConfigType::Automation { resource } => {
            let stable_id = config
                .origin_object_id
                .clone()
                .unwrap_or_else(|| config.coordinate.stable_uuid());
            platform(clients, config)?
                .automation
                .upsert(*resource, &stable_id, &resolved.payload)?
        }
        ConfigType::Bucket => {
            let bucket_name = resolved
                .payload
                .get("bucketName")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(&resolved.name);
            platform(clients, config)?
                .buckets
                .upsert(bucket_name, &resolved.payload)?
        }
        ConfigType::Document { kind, private } => platform(clients, config)?.documents.upsert(
            &config.coordinate.external_id(),
            config.origin_object_id.as_deref(),
            &resolved.name,
            kind.as_str(),
            *private,
            &resolved.payload,
        )?,
        ConfigType::Segment => platform(clients, config)?.segments.upsert(
            &config.coordinate.external_id(),
            config.origin_object_id.as_deref(),
            &resolved.payload,
        )?,
    };

    Ok(entity_for(config, resolved, &outcome))
}

fn entity_for(
    config: &Config,
    resolved: &ResolvedConfig,
    outcome: &UpsertOutcome,
) -> ResolvedEntity {
    let mut properties = BTreeMap::new();
    properties.insert(PROP_ID.to_string(), serde_json::json!(outcome.id));
    properties.insert(PROP_NAME.to_string(), serde_json::json!(resolved.name));
    if let Some(scope) = &resolved.scope {
        properties.insert(PROP_SCOPE.to_string(), serde_json::json!(scope));
    }
    ResolvedEntity::deployed(resolved.name.clone(), config.coordinate.clone(), properties)
}

fn platform<'a>(clients: &'a ClientSet, config: &Config) -> Result<&'a PlatformClients> {
    clients.platform().with_context(|| {
        format!(
            "environment has no platform credentials (OAuth) for '{}' configs",
            config.coordinate.kind
        )
    })
}

fn deploy_classic(
    config: &Config,
    resolved: &ResolvedConfig,
    clients: &ClientSet,
    api_id: &str,
) -> Result<UpsertOutcome> {
    let spec = api::get(api_id).with_context(|| format!("unknown API '{api_id}'"))?;
    let scope = resolved.scope.as_deref();

    if spec.non_unique_name {
        let stable_id = stable_classic_id(config, resolved)
            .with_context(|| format!("API '{api_id}' needs originObjectId or a referenced id"))?;
        let outcome = clients.classic.upsert_by_id(
            spec,
            scope,
            &stable_id,
            &resolved.name,
            &resolved.payload,
        )?;
        return Ok(outcome);
    }

    Ok(clients
        .classic
        .upsert_by_name(spec, scope, &resolved.name, &resolved.payload)?)
}

fn deploy_settings(
    config: &Config,
    resolved: &ResolvedConfig,
    clients: &ClientSet,
    schema_id: &str,
    schema_version: Option<&str>,
) -> Result<UpsertOutcome> {
    let scope = resolved
        .scope
        .as_deref()
        .context("settings configs require a resolved scope")?;
    let external_id = config.coordinate.external_id();
    let object = SettingsObject {
        schema_id,
        schema_version,
        scope,
        external_id: &external_id,
        value: &resolved.payload,
    };
    match &config.origin_object_id {
        Some(origin) => Ok(clients.settings.update_by_object_id(origin, &object)?),
        None => Ok(clients.settings.upsert(&object)?),
    }
}

/// The stable object id for a non-unique-name API: the configured origin
/// anchor, or the first id-property reference among the parameters.
fn stable_classic_id(config: &Config, resolved: &ResolvedConfig) -> Option<String> {
    if let Some(origin) = &config.origin_object_id {
        return Some(origin.clone());
    }
    config
        .parameters
        .iter()
        .find(|(_, p)| matches!(p, Parameter::Reference(r) if r.property == PROP_ID))
        .and_then(|(name, _)| resolved.values.get(name))
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
