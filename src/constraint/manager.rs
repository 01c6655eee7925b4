// ==========================================
// 住院医师排班合规核心 - 约束管理器 (工厂)
// ==========================================
// 职责: 默认约束集 / 韧性约束集 两个工厂 + 注册完整性检查
// 红线: 两个工厂都从同一张声明表生成, 不允许手工双注册
// ==========================================

use crate::config::SolverSettings;
use crate::constraint::catalog::{ConstraintProfile, ConstraintType};
use crate::constraint::registry::{ConstraintDefinition, ConstraintRegistry, ConstraintRegistryBuilder};
use crate::error::{CoreError, CoreResult};
use tracing::info;

pub struct ConstraintManager;

impl ConstraintManager {
    /// 默认约束集 (Core 档)
    pub fn create_default(settings: &SolverSettings) -> CoreResult<ConstraintRegistry> {
        Self::create(ConstraintProfile::Core, settings)
    }

    /// 韧性约束集 (Core 档 + Resilience 档)
    pub fn create_resilience_aware(settings: &SolverSettings) -> CoreResult<ConstraintRegistry> {
        Self::create(ConstraintProfile::Resilience, settings)
    }

    fn create(profile: ConstraintProfile, settings: &SolverSettings) -> CoreResult<ConstraintRegistry> {
        let mut builder = ConstraintRegistryBuilder::new(profile);
        for constraint_type in ConstraintType::for_profile(profile) {
            let weight = settings.weight_overrides.get(&constraint_type).copied();
            builder.register(ConstraintDefinition::from_catalog(constraint_type, weight))?;
        }
        let registry = builder.build()?;
        Self::verify_completeness(&registry)?;

        info!(
            profile = profile.as_str(),
            hard = registry.all_hard().len(),
            soft = registry.all_soft().len(),
            "约束集创建完成"
        );
        Ok(registry)
    }

    /// 注册完整性: 配置档声明的每个约束类型都必须出现在注册表中
    pub fn verify_completeness(registry: &ConstraintRegistry) -> CoreResult<()> {
        let registered = registry.registered_types();
        let missing: Vec<String> = ConstraintType::for_profile(registry.profile())
            .into_iter()
            .filter(|t| !registered.contains(t))
            .map(|t| t.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::MissingConstraints {
                profile: registry.profile().as_str().to_string(),
                missing,
            })
        }
    }

    /// 两个工厂同时校验 (Core 档约束须同时出现在两者中)
    pub fn verify_factories(settings: &SolverSettings) -> CoreResult<()> {
        let default = Self::create_default(settings)?;
        let resilience = Self::create_resilience_aware(settings)?;
        let missing: Vec<String> = default
            .registered_types()
            .difference(&resilience.registered_types())
            .map(|t| t.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::MissingConstraints {
                profile: ConstraintProfile::Resilience.as_str().to_string(),
                missing,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_are_complete() {
        let settings = SolverSettings::default();
        ConstraintManager::verify_factories(&settings).unwrap();

        let default = ConstraintManager::create_default(&settings).unwrap();
        let resilience = ConstraintManager::create_resilience_aware(&settings).unwrap();
        for t in ConstraintType::ALL {
            assert!(resilience.contains(t), "{} missing from resilience set", t);
            if t.declaration().profile == ConstraintProfile::Core {
                assert!(default.contains(t), "{} missing from default set", t);
            }
        }
        assert!(!default.contains(ConstraintType::ResilienceN1Coverage));
    }

    #[test]
    fn test_incomplete_registry_detected() {
        let mut builder = ConstraintRegistryBuilder::new(ConstraintProfile::Core);
        builder
            .register(ConstraintDefinition::from_catalog(ConstraintType::OnePrimaryPerBlock, None))
            .unwrap();
        let registry = builder.build().unwrap();
        match ConstraintManager::verify_completeness(&registry) {
            Err(CoreError::MissingConstraints { profile, missing }) => {
                assert_eq!(profile, "default");
                assert!(missing.contains(&"BLOCKING_ABSENCE".to_string()));
                assert!(!missing.contains(&"ONE_PRIMARY_PER_BLOCK".to_string()));
            }
            other => panic!("expected missing constraints, got {:?}", other),
        }
    }

    #[test]
    fn test_weight_override_applied() {
        let mut settings = SolverSettings::default();
        settings
            .weight_overrides
            .insert(ConstraintType::CallPreference, 5.0);
        let registry = ConstraintManager::create_default(&settings).unwrap();
        assert_eq!(registry.weight_of(ConstraintType::CallPreference), Some(5.0));
    }

    #[test]
    fn test_bad_override_rejected_at_construction() {
        let mut settings = SolverSettings::default();
        settings
            .weight_overrides
            .insert(ConstraintType::CallPreference, 5_000.0);
        assert!(matches!(
            ConstraintManager::create_default(&settings),
            Err(CoreError::WeightHierarchyViolation { .. })
        ));
    }
}
