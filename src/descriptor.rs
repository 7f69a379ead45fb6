//! Run descriptor (macro) generation.
//!
//! The directive vocabulary belongs to the simulation executable; this module
//! only substitutes the per-job placeholders `{job_id}`, `{events}`,
//! `{seed_a}` and `{seed_b}` into the configured template.

use crate::job::JobSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    contents: String,
}

impl RunDescriptor {
    pub fn render(template: &str, spec: &JobSpec) -> Self {
        let contents = template
            .replace("{job_id}", &spec.job_id.to_string())
            .replace("{events}", &spec.events.to_string())
            .replace("{seed_a}", &spec.seeds.primary.to_string())
            .replace("{seed_b}", &spec.seeds.secondary.to_string());
        Self { contents }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.contents.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationConfig, SimulationSettings, DEFAULT_DESCRIPTOR_TEMPLATE};

    #[test]
    fn default_template_carries_seed_pair_and_events() {
        let config = SimulationConfig::try_from(SimulationSettings {
            num_jobs: 8,
            events_per_job: 100,
            ..SimulationSettings::default()
        })
        .unwrap();
        let spec = JobSpec::new(&config, 7);

        let descriptor = RunDescriptor::render(DEFAULT_DESCRIPTOR_TEMPLATE, &spec);
        let lines: Vec<&str> = descriptor.contents().lines().filter(|l| !l.is_empty()).collect();

        assert_eq!(
            lines,
            vec![
                "/run/initialize",
                "/CsI/generator/mode ePairDeflected",
                "/CsI/random/seed 7 12352",
                "/CsI/random/apply  1",
                "/run/beamOn 100",
            ]
        );
    }

    #[test]
    fn custom_template_placeholders() {
        let config = SimulationConfig::try_from(SimulationSettings::default()).unwrap();
        let spec = JobSpec::new(&config, 3);

        let descriptor = RunDescriptor::render("# job {job_id}\n/run/beamOn {events}\n", &spec);
        assert_eq!(descriptor.contents(), "# job 3\n/run/beamOn 10000\n");
    }
}
