use serde::{Deserialize, Serialize};

/// Content types accepted for YAML recipes.
pub const YAML_CONTENT_TYPES: &[&str] = &["application/x-yaml", "text/yaml", "text/x-yaml"];

pub const DOCKERFILE_CONTENT_TYPE: &str = "text/x-dockerfile";

/// The user-supplied environment description, as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(rename = "type")]
    pub recipe_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default)]
    pub content: String,
}

impl Recipe {
    pub fn new(
        recipe_type: impl Into<String>,
        content_type: Option<&str>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            recipe_type: recipe_type.into(),
            content_type: content_type.map(str::to_string),
            content: content.into(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_from_yaml() {
        let yaml = "type: compose\ncontent_type: application/x-yaml\ncontent: |\n  services: {}\n";
        let recipe: Recipe = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(recipe.recipe_type, "compose");
        assert_eq!(recipe.content_type(), Some("application/x-yaml"));
        assert_eq!(recipe.content, "services: {}\n");
    }
}
