use crate::model::Identity;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Strategy {
    StructuredConfig,
    LineScan,
    Placeholder,
}

impl Strategy {
    const ORDER: [Self; 3] = [Self::StructuredConfig, Self::LineScan, Self::Placeholder];

    fn attempt(self, credential: &str) -> Option<Identity> {
        match self {
            Self::StructuredConfig => from_structured_config(credential),
            Self::LineScan => from_name_line(credential),
            Self::Placeholder => Some(Identity::placeholder()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CredentialDocument {
    #[serde(default, rename = "current-context")]
    current_context: Option<String>,
    #[serde(default)]
    contexts: Option<Vec<NamedContextEntry>>,
}

#[derive(Debug, Deserialize)]
struct NamedContextEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context: Option<ContextEntry>,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    #[serde(default)]
    user: Option<String>,
}

/// Derives a display identity from a kubeconfig blob. Never fails: malformed
/// input only lowers the quality of the answer, down to a fixed placeholder.
pub fn resolve_identity(credential: &str) -> Identity {
    Strategy::ORDER
        .into_iter()
        .find_map(|strategy| {
            let identity = strategy.attempt(credential)?;
            debug!(?strategy, user = %identity.id, "resolved identity");
            Some(identity)
        })
        .unwrap_or_else(Identity::placeholder)
}

fn from_structured_config(credential: &str) -> Option<Identity> {
    let document = serde_yaml::from_str::<CredentialDocument>(credential).ok()?;
    let contexts = document.contexts.unwrap_or_default();
    let current_context = document
        .current_context
        .filter(|value| !value.trim().is_empty());
    if current_context.is_none() && contexts.is_empty() {
        return None;
    }

    let first = contexts.first().and_then(|entry| entry.name.clone());
    let active = current_context.or(first);
    let user = active
        .and_then(|active| {
            contexts
                .iter()
                .find(|entry| entry.name.as_deref() == Some(active.as_str()))
        })
        .and_then(|entry| entry.context.as_ref())
        .and_then(|context| context.user.clone())
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| Identity::PLACEHOLDER_ID.to_string());

    Some(Identity::named(user))
}

fn from_name_line(credential: &str) -> Option<Identity> {
    let line = credential
        .lines()
        .find(|line| line.contains("name:") && !line.contains("cluster:"))?;
    let (_, value) = line.split_once("name:")?;
    let value = value
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if value.is_empty() {
        return None;
    }
    Some(Identity::named(value))
}

#[cfg(test)]
mod tests {
    use super::resolve_identity;
    use crate::model::Identity;

    const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- cluster:
    server: https://127.0.0.1:6443
  name: kind-dev
contexts:
- context:
    cluster: kind-dev
    user: carol
  name: c0
- context:
    cluster: kind-dev
    user: alice
  name: c1
current-context: c1
users:
- name: alice
  user:
    token: abc
"#;

    #[test]
    fn current_context_user_is_the_identity() {
        assert_eq!(resolve_identity(KUBECONFIG), Identity::named("alice"));
    }

    #[test]
    fn json_credential_is_structured_too() {
        let json = r#"{
            "current-context": "c1",
            "contexts": [{ "name": "c1", "context": { "cluster": "x", "user": "alice" } }]
        }"#;
        let identity = resolve_identity(json);
        assert_eq!(identity.id, "alice");
        assert_eq!(identity.full_name, "alice");
        assert_eq!(identity.avatar, None);
    }

    #[test]
    fn missing_current_context_falls_back_to_first_context() {
        let config = KUBECONFIG.replace("current-context: c1\n", "");
        assert_eq!(resolve_identity(&config), Identity::named("carol"));
    }

    #[test]
    fn dangling_current_context_yields_placeholder_id() {
        let config = KUBECONFIG
            .replace("current-context: c1", "current-context: gone");
        assert_eq!(resolve_identity(&config), Identity::named("kubernetes-user"));
    }

    #[test]
    fn unparsable_blob_uses_name_line() {
        let blob = "contexts: [\n  name: bob\n";
        assert_eq!(resolve_identity(blob), Identity::named("bob"));
    }

    #[test]
    fn name_lines_inside_cluster_entries_are_skipped() {
        let blob = "{{ broken\n- cluster: name: prod\n  name: \"dave\"\n";
        assert_eq!(resolve_identity(blob), Identity::named("dave"));
    }

    #[test]
    fn anything_else_yields_the_placeholder() {
        for input in ["", "not a kubeconfig at all", "{{{{", "name:   ", "\u{0}\u{1}binary"] {
            assert_eq!(resolve_identity(input), Identity::placeholder(), "input {input:?}");
        }
        assert_eq!(Identity::placeholder().full_name, "Kubernetes User");
    }
}
