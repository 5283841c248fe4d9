//! Compose-style recipes: a `services:` map of containers.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_yaml_ng as serde_yaml;
use wsrt_core::serde_ext::{option_string_or_number, string_or_number_list};
use wsrt_core::warning::UNKNOWN_COMPOSE_FIELD;
use wsrt_core::{Recipe, ValidationError, Warning};

use crate::model::{BuildContext, ContainerConfig, RuntimeModel};
use crate::registry::{Machines, RecipeFormat};
use crate::validate;

pub const TYPE: &str = "compose";

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ComposeRecipe {
    #[serde(default, deserialize_with = "option_string_or_number")]
    pub version: Option<String>,

    #[serde(default)]
    pub services: IndexMap<String, ComposeService>,
}

/// One entry under `services:`, as written by the user.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ComposeService {
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default, deserialize_with = "build_context")]
    pub build: Option<BuildContext>,

    #[serde(default)]
    pub container_name: Option<String>,

    #[serde(default, deserialize_with = "command_line")]
    pub command: Vec<String>,

    #[serde(default, deserialize_with = "command_line")]
    pub entrypoint: Vec<String>,

    #[serde(default, deserialize_with = "key_value_map")]
    pub environment: IndexMap<String, String>,

    #[serde(default, deserialize_with = "key_value_map")]
    pub labels: IndexMap<String, String>,

    #[serde(default, deserialize_with = "string_or_number_list")]
    pub expose: Vec<String>,

    #[serde(default)]
    pub mem_limit: Option<u64>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub links: Vec<String>,

    #[serde(default)]
    pub volumes_from: Vec<String>,

    // Parsed only so the validator can reject them.
    #[serde(default, deserialize_with = "string_or_number_list")]
    pub ports: Vec<String>,

    #[serde(default)]
    pub volumes: Vec<String>,

    #[serde(default)]
    pub networks: Option<serde_yaml::Value>,

    /// Keys this engine does not understand.
    #[serde(flatten)]
    pub unknown: IndexMap<String, serde_yaml::Value>,
}

impl ComposeService {
    pub fn has_networks(&self) -> bool {
        match &self.networks {
            None | Some(serde_yaml::Value::Null) => false,
            Some(serde_yaml::Value::Sequence(seq)) => !seq.is_empty(),
            Some(serde_yaml::Value::Mapping(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }

    fn into_container(self) -> ContainerConfig {
        ContainerConfig {
            image: self.image,
            build: self.build,
            container_name: self.container_name,
            command: self.command,
            entrypoint: self.entrypoint,
            environment: self.environment,
            expose: self.expose,
            labels: self.labels,
            mem_limit: self.mem_limit,
            depends_on: self.depends_on,
            links: self.links,
            volumes_from: self.volumes_from,
            pod: None,
        }
    }
}

pub struct ComposeFormat;

impl RecipeFormat for ComposeFormat {
    type Raw = ComposeRecipe;

    fn recipe_type(&self) -> &'static str {
        TYPE
    }

    fn parse(&self, recipe: &Recipe) -> Result<ComposeRecipe, ValidationError> {
        super::require_yaml_content_type(recipe)?;
        super::parse_yaml(&recipe.content)
    }

    fn validate(&self, raw: &ComposeRecipe, machines: &Machines) -> Result<(), ValidationError> {
        validate::validate_compose(raw, machines)
    }

    fn to_internal(
        &self,
        raw: ComposeRecipe,
        _machines: &Machines,
        warnings: &mut Vec<Warning>,
    ) -> Result<RuntimeModel, ValidationError> {
        let mut containers = IndexMap::with_capacity(raw.services.len());
        for (name, service) in raw.services {
            for key in service.unknown.keys() {
                warnings.push(Warning::new(
                    UNKNOWN_COMPOSE_FIELD,
                    format!("Field '{key}' of service '{name}' is not supported and will be ignored"),
                ));
            }
            containers.insert(name, service.into_container());
        }

        Ok(RuntimeModel {
            containers,
            ..Default::default()
        })
    }
}

/// `build: ./dir` or `build: {context, dockerfile, args}`.
fn build_context<'de, D>(deserializer: D) -> Result<Option<BuildContext>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Build {
        Context(String),
        Full(BuildContext),
    }

    Ok(match Option::<Build>::deserialize(deserializer)? {
        None => None,
        Some(Build::Context(context)) => Some(BuildContext {
            context: Some(context),
            ..Default::default()
        }),
        Some(Build::Full(build)) => Some(build),
    })
}

/// `command: npm start` or `command: [npm, start]`.
fn command_line<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CommandVisitor;

    impl<'de> Visitor<'de> for CommandVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a command string or a list of arguments")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value.split_whitespace().map(str::to_string).collect())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut args = Vec::new();
            while let Some(arg) = seq.next_element::<String>()? {
                args.push(arg);
            }
            Ok(args)
        }
    }

    deserializer.deserialize_any(CommandVisitor)
}

/// `{KEY: value}` or `[KEY=value, FLAG]`.
fn key_value_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeyValueVisitor;

    impl<'de> Visitor<'de> for KeyValueVisitor {
        type Value = IndexMap<String, String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a mapping or a list of KEY=VALUE entries")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(IndexMap::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = IndexMap::new();
            while let Some((key, value)) = map.next_entry::<String, serde_yaml::Value>()? {
                let value = match value {
                    serde_yaml::Value::Null => String::new(),
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    _ => {
                        return Err(de::Error::custom(format!(
                            "value of '{key}' must be a scalar"
                        )))
                    }
                };
                entries.insert(key, value);
            }
            Ok(entries)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut entries = IndexMap::new();
            while let Some(entry) = seq.next_element::<String>()? {
                let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
                entries.insert(key.to_string(), value.to_string());
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(KeyValueVisitor)
}
