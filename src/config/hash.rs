//! Manifest fingerprinting for change detection.
//!
//! Deterministic SHA-256 fingerprints of plan structures, used to decide
//! whether a declared resource differs from what was last applied.
//! Collections whose order is irrelevant (env vars, domains, allow-list
//! rules) are sorted before hashing; routes are hashed in declared order
//! because their order is semantic.

use sha2::{Digest, Sha256};

use crate::resources::{KeyValuePlan, StaticSitePlan, WebServicePlan};

use super::manifest::Manifest;

/// Hasher for computing manifest fingerprints.
#[derive(Debug, Default)]
pub struct ManifestHasher;

impl ManifestHasher {
    /// Creates a new manifest hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a fingerprint of the entire manifest.
    #[must_use]
    pub fn hash_manifest(&self, manifest: &Manifest) -> String {
        let mut hasher = Sha256::new();

        hasher.update(manifest.project.name.as_bytes());
        hasher.update(manifest.project.environment.as_bytes());
        hasher.update(manifest.provider.owner_id.as_bytes());

        for service in &manifest.web_services {
            hasher.update(self.hash_web_service(service).as_bytes());
        }
        for site in &manifest.static_sites {
            hasher.update(self.hash_static_site(site).as_bytes());
        }
        for instance in &manifest.key_value {
            hasher.update(self.hash_key_value(instance).as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a fingerprint for one web service plan.
    #[must_use]
    pub fn hash_web_service(&self, plan: &WebServicePlan) -> String {
        let mut hasher = Sha256::new();

        hasher.update(plan.name.as_bytes());
        hasher.update(plan.plan.as_bytes());
        hasher.update(plan.region.as_bytes());
        Self::update_opt(&mut hasher, plan.image.as_deref());
        Self::update_opt(&mut hasher, plan.repo.as_deref());
        Self::update_opt(&mut hasher, plan.branch.as_deref());
        Self::update_opt(&mut hasher, plan.build_command.as_deref());
        Self::update_opt(&mut hasher, plan.start_command.as_deref());
        Self::update_opt(&mut hasher, plan.health_check_path.as_deref());
        hasher.update(plan.num_instances.to_be_bytes());

        if let Some(env_vars) = &plan.env_vars {
            hasher.update([1u8]);
            let mut sorted: Vec<_> = env_vars.iter().collect();
            sorted.sort_by(|a, b| a.key.cmp(&b.key));
            for var in sorted {
                hasher.update(var.key.as_bytes());
                hasher.update(var.value.as_bytes());
            }
        } else {
            hasher.update([0u8]);
        }

        if let Some(files) = &plan.secret_files {
            hasher.update([1u8]);
            let mut sorted: Vec<_> = files.iter().collect();
            sorted.sort_by(|a, b| a.path.cmp(&b.path));
            for file in sorted {
                hasher.update(file.path.as_bytes());
                hasher.update(file.contents.as_bytes());
            }
        } else {
            hasher.update([0u8]);
        }

        if let Some(domains) = &plan.custom_domains {
            hasher.update([1u8]);
            let mut sorted = domains.clone();
            sorted.sort();
            for domain in sorted {
                hasher.update(domain.as_bytes());
            }
        } else {
            hasher.update([0u8]);
        }

        if let Some(disk) = &plan.disk {
            hasher.update([1u8]);
            hasher.update(disk.name.as_bytes());
            hasher.update(disk.size_gb.to_be_bytes());
            hasher.update(disk.mount_path.as_bytes());
        } else {
            hasher.update([0u8]);
        }

        if let Some(autoscaling) = &plan.autoscaling {
            hasher.update([1u8]);
            hasher.update(autoscaling.min.to_be_bytes());
            hasher.update(autoscaling.max.to_be_bytes());
            hasher.update(autoscaling.target_cpu_percent.to_be_bytes());
        } else {
            hasher.update([0u8]);
        }

        Self::update_opt(&mut hasher, plan.environment_id.as_deref());
        Self::update_json(&mut hasher, plan.notifications.as_ref());
        Self::update_json(&mut hasher, plan.log_stream.as_ref());

        hex::encode(hasher.finalize())
    }

    /// Computes a fingerprint for one static site plan.
    #[must_use]
    pub fn hash_static_site(&self, plan: &StaticSitePlan) -> String {
        let mut hasher = Sha256::new();

        hasher.update(plan.name.as_bytes());
        hasher.update(plan.repo.as_bytes());
        Self::update_opt(&mut hasher, plan.branch.as_deref());
        Self::update_opt(&mut hasher, plan.build_command.as_deref());
        Self::update_opt(&mut hasher, plan.publish_path.as_deref());

        if let Some(env_vars) = &plan.env_vars {
            hasher.update([1u8]);
            let mut sorted: Vec<_> = env_vars.iter().collect();
            sorted.sort_by(|a, b| a.key.cmp(&b.key));
            for var in sorted {
                hasher.update(var.key.as_bytes());
                hasher.update(var.value.as_bytes());
            }
        } else {
            hasher.update([0u8]);
        }

        if let Some(domains) = &plan.custom_domains {
            hasher.update([1u8]);
            let mut sorted = domains.clone();
            sorted.sort();
            for domain in sorted {
                hasher.update(domain.as_bytes());
            }
        } else {
            hasher.update([0u8]);
        }

        // Route order is semantic; hash in declared order.
        if let Some(routes) = &plan.routes {
            hasher.update([1u8]);
            for route in routes {
                Self::update_json(&mut hasher, Some(route));
            }
        } else {
            hasher.update([0u8]);
        }

        Self::update_opt(&mut hasher, plan.environment_id.as_deref());
        Self::update_json(&mut hasher, plan.log_stream.as_ref());

        hex::encode(hasher.finalize())
    }

    /// Computes a fingerprint for one key-value plan.
    #[must_use]
    pub fn hash_key_value(&self, plan: &KeyValuePlan) -> String {
        let mut hasher = Sha256::new();

        hasher.update(plan.name.as_bytes());
        hasher.update(plan.plan.as_bytes());
        hasher.update(plan.region.as_bytes());
        Self::update_json(&mut hasher, plan.maxmemory_policy.as_ref());

        if let Some(rules) = &plan.ip_allow_list {
            hasher.update([1u8]);
            let mut sorted: Vec<_> = rules.iter().collect();
            sorted.sort_by(|a, b| {
                a.cidr_block
                    .cmp(&b.cidr_block)
                    .then_with(|| a.description.cmp(&b.description))
            });
            for rule in sorted {
                hasher.update(rule.cidr_block.as_bytes());
                hasher.update(rule.description.as_bytes());
            }
        } else {
            hasher.update([0u8]);
        }

        Self::update_opt(&mut hasher, plan.environment_id.as_deref());
        Self::update_json(&mut hasher, plan.log_stream.as_ref());

        hex::encode(hasher.finalize())
    }

    /// Computes a short fingerprint (first 8 characters) for display.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two fingerprints in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Feeds an optional string into the hasher, marking absence so that
    /// `None` and `Some("")` fingerprint differently.
    fn update_opt(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }

    /// Feeds an optional serializable value into the hasher as JSON.
    fn update_json<T: serde::Serialize>(hasher: &mut Sha256, value: Option<&T>) {
        match value {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update(serde_json::to_vec(value).unwrap_or_default());
            }
            None => hasher.update([0u8]),
        }
    }
}
