mod provider_type;

pub use provider_type::ProviderType;
