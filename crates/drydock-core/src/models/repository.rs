use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RegistryProvider {
    Hosted,
    Ecr,
    Gcr,
    DockerHub,
    Private,
}

impl RegistryProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Ecr => "ecr",
            Self::Gcr => "gcr",
            Self::DockerHub => "dockerhub",
            Self::Private => "private",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub domain: String,
    pub id: String,
    pub name: String,
    pub provider: RegistryProvider,
    pub local: bool,
}

impl Repository {
    pub fn hosted(domain: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            id: id.into(),
            name: name.into(),
            provider: RegistryProvider::Hosted,
            local: true,
        }
    }

    pub fn remote(
        domain: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        provider: RegistryProvider,
    ) -> Self {
        Self {
            domain: domain.into(),
            id: id.into(),
            name: name.into(),
            provider,
            local: false,
        }
    }

    /// Only repositories hosted by this registry can receive copied images.
    pub fn is_local_write_target(&self) -> bool {
        self.provider == RegistryProvider::Hosted && self.local
    }
}
