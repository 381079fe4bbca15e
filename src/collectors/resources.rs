use crate::collectors::CollectError;
use crate::providers::ResourceProvider;
use crate::snapshot::SystemResources;
use std::time::Duration;

pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

// Blocks for CPU_SAMPLE_WINDOW. One failed reading fails the section.
pub fn collect_resources(provider: &dyn ResourceProvider) -> Result<SystemResources, CollectError> {
    Ok(SystemResources {
        cpu_percent: provider.cpu_percent(CPU_SAMPLE_WINDOW)?,
        memory: provider.memory()?,
        swap: provider.swap()?,
    })
}
