use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    CopyToRepository,
    Notify,
    Scan,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CopyToRepository => "copy_to_repository",
            Self::Notify => "notify",
            Self::Scan => "scan",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyToRepository {
    pub destination_repository_id: String,
    /// Destination tag; when unset the source tag is reused.
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notify {
    pub target: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub scanner: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentSpec {
    CopyToRepository(CopyToRepository),
    Notify(Notify),
    Scan(Scan),
}

impl ComponentSpec {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::CopyToRepository(_) => ComponentKind::CopyToRepository,
            Self::Notify(_) => ComponentKind::Notify,
            Self::Scan(_) => ComponentKind::Scan,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineComponent {
    pub id: String,
    pub spec: ComponentSpec,
}

impl PipelineComponent {
    pub fn new(id: impl Into<String>, spec: ComponentSpec) -> Self {
        Self {
            id: id.into(),
            spec,
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.spec.kind()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: String,
    pub domain: String,
    pub name: String,
    pub components: Vec<PipelineComponent>,
}

impl Pipeline {
    pub fn component_index(&self, component_id: &str) -> Option<usize> {
        self.components
            .iter()
            .position(|component| component.id == component_id)
    }
}
