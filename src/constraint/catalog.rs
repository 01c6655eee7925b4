// ==========================================
// 住院医师排班合规核心 - 约束目录
// ==========================================
// 职责: 全部约束类型的唯一声明表 (类型/分类/默认权重/单调性/配置档)
// 红线: 两个工厂共用同一张声明表, 新增约束只改此处
// 红线: declaration() 必须穷举匹配, 漏声明即编译失败
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ConstraintType - 约束类型 (封闭集合)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    // ===== 硬约束 =====
    OnePrimaryPerBlock,
    BlockingAbsence,
    RotationCredential,
    PgyEligibility,
    SupervisionRatio,
    RollingWorkHours,
    PostDeploymentRecovery,
    CallConsecutiveLimit,
    PostCallRest,
    CallFrequency,

    // ===== 软约束: 值班公平 =====
    CallWorstDay,
    CallSpacing,
    CallWeekdayBalance,
    CallPreference,

    // ===== 软约束: 工作量 =====
    WorkloadBalance,
    BlockPreference,
    HoursHeadroom,

    // ===== 软约束: 韧性 =====
    ResilienceN1Coverage,
    ResilienceUtilizationBuffer,
}

impl ConstraintType {
    pub const ALL: [ConstraintType; 19] = [
        ConstraintType::OnePrimaryPerBlock,
        ConstraintType::BlockingAbsence,
        ConstraintType::RotationCredential,
        ConstraintType::PgyEligibility,
        ConstraintType::SupervisionRatio,
        ConstraintType::RollingWorkHours,
        ConstraintType::PostDeploymentRecovery,
        ConstraintType::CallConsecutiveLimit,
        ConstraintType::PostCallRest,
        ConstraintType::CallFrequency,
        ConstraintType::CallWorstDay,
        ConstraintType::CallSpacing,
        ConstraintType::CallWeekdayBalance,
        ConstraintType::CallPreference,
        ConstraintType::WorkloadBalance,
        ConstraintType::BlockPreference,
        ConstraintType::HoursHeadroom,
        ConstraintType::ResilienceN1Coverage,
        ConstraintType::ResilienceUtilizationBuffer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintType::OnePrimaryPerBlock => "ONE_PRIMARY_PER_BLOCK",
            ConstraintType::BlockingAbsence => "BLOCKING_ABSENCE",
            ConstraintType::RotationCredential => "ROTATION_CREDENTIAL",
            ConstraintType::PgyEligibility => "PGY_ELIGIBILITY",
            ConstraintType::SupervisionRatio => "SUPERVISION_RATIO",
            ConstraintType::RollingWorkHours => "ROLLING_WORK_HOURS",
            ConstraintType::PostDeploymentRecovery => "POST_DEPLOYMENT_RECOVERY",
            ConstraintType::CallConsecutiveLimit => "CALL_CONSECUTIVE_LIMIT",
            ConstraintType::PostCallRest => "POST_CALL_REST",
            ConstraintType::CallFrequency => "CALL_FREQUENCY",
            ConstraintType::CallWorstDay => "CALL_WORST_DAY",
            ConstraintType::CallSpacing => "CALL_SPACING",
            ConstraintType::CallWeekdayBalance => "CALL_WEEKDAY_BALANCE",
            ConstraintType::CallPreference => "CALL_PREFERENCE",
            ConstraintType::WorkloadBalance => "WORKLOAD_BALANCE",
            ConstraintType::BlockPreference => "BLOCK_PREFERENCE",
            ConstraintType::HoursHeadroom => "HOURS_HEADROOM",
            ConstraintType::ResilienceN1Coverage => "RESILIENCE_N1_COVERAGE",
            ConstraintType::ResilienceUtilizationBuffer => "RESILIENCE_UTILIZATION_BUFFER",
        }
    }

    /// 声明表 (穷举匹配)
    pub fn declaration(&self) -> ConstraintDeclaration {
        use ConstraintCategory as C;
        use ConstraintProfile as P;
        match self {
            ConstraintType::OnePrimaryPerBlock => hard(C::Compliance, true, P::Core),
            ConstraintType::BlockingAbsence => hard(C::Compliance, true, P::Core),
            ConstraintType::RotationCredential => hard(C::Compliance, true, P::Core),
            ConstraintType::PgyEligibility => hard(C::Compliance, true, P::Core),
            // 增加带教可消除缺口, 不可用于部分解剪枝
            ConstraintType::SupervisionRatio => hard(C::Compliance, false, P::Core),
            ConstraintType::RollingWorkHours => hard(C::Workload, true, P::Core),
            ConstraintType::PostDeploymentRecovery => hard(C::Compliance, true, P::Core),
            ConstraintType::CallConsecutiveLimit => hard(C::Compliance, true, P::Core),
            ConstraintType::PostCallRest => hard(C::Compliance, true, P::Core),
            ConstraintType::CallFrequency => hard(C::Compliance, true, P::Core),

            ConstraintType::CallWorstDay => soft(C::Equity, 1000.0, P::Core),
            ConstraintType::CallSpacing => soft(C::Equity, 500.0, P::Core),
            ConstraintType::CallWeekdayBalance => soft(C::Equity, 100.0, P::Core),
            ConstraintType::CallPreference => soft(C::Preference, 20.0, P::Core),

            ConstraintType::WorkloadBalance => soft(C::Workload, 300.0, P::Core),
            ConstraintType::BlockPreference => soft(C::Preference, 10.0, P::Core),
            ConstraintType::HoursHeadroom => soft(C::Workload, 50.0, P::Core),

            ConstraintType::ResilienceN1Coverage => soft(C::Resilience, 400.0, P::Resilience),
            ConstraintType::ResilienceUtilizationBuffer => {
                soft(C::Resilience, 150.0, P::Resilience)
            }
        }
    }

    pub fn is_hard(&self) -> bool {
        self.declaration().kind == ConstraintKind::Hard
    }

    /// 指定配置档下应注册的约束类型
    pub fn for_profile(profile: ConstraintProfile) -> Vec<ConstraintType> {
        ConstraintType::ALL
            .iter()
            .copied()
            .filter(|t| t.declaration().profile.included_in(profile))
            .collect()
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConstraintType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        ConstraintType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("未知约束类型: {}", s))
    }
}

// ==========================================
// 声明要素
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintCategory {
    Equity,
    Workload,
    Compliance,
    Preference,
    Resilience,
}

impl fmt::Display for ConstraintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintCategory::Equity => "EQUITY",
            ConstraintCategory::Workload => "WORKLOAD",
            ConstraintCategory::Compliance => "COMPLIANCE",
            ConstraintCategory::Preference => "PREFERENCE",
            ConstraintCategory::Resilience => "RESILIENCE",
        };
        write!(f, "{}", s)
    }
}

/// 配置档: Core 进入两个工厂, Resilience 仅进入韧性工厂
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintProfile {
    Core,
    Resilience,
}

impl ConstraintProfile {
    /// 本档约束是否属于目标配置档
    pub fn included_in(&self, target: ConstraintProfile) -> bool {
        match (self, target) {
            (ConstraintProfile::Core, _) => true,
            (ConstraintProfile::Resilience, ConstraintProfile::Resilience) => true,
            (ConstraintProfile::Resilience, ConstraintProfile::Core) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintProfile::Core => "default",
            ConstraintProfile::Resilience => "resilience_aware",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDeclaration {
    pub kind: ConstraintKind,
    pub category: ConstraintCategory,
    /// 默认权重 (硬约束为 0)
    pub default_weight: f64,
    /// 单调: 追加排班只会增加违规 (可用于部分解剪枝)
    pub monotone: bool,
    pub profile: ConstraintProfile,
}

fn hard(category: ConstraintCategory, monotone: bool, profile: ConstraintProfile) -> ConstraintDeclaration {
    ConstraintDeclaration {
        kind: ConstraintKind::Hard,
        category,
        default_weight: 0.0,
        monotone,
        profile,
    }
}

fn soft(category: ConstraintCategory, weight: f64, profile: ConstraintProfile) -> ConstraintDeclaration {
    ConstraintDeclaration {
        kind: ConstraintKind::Soft,
        category,
        default_weight: weight,
        monotone: false,
        profile,
    }
}

// ==========================================
// 权重层级
// ==========================================
// 链内权重必须严格递减; 注册表构建时校验
pub struct WeightHierarchy {
    pub name: &'static str,
    pub chain: &'static [ConstraintType],
}

pub const WEIGHT_HIERARCHIES: &[WeightHierarchy] = &[
    WeightHierarchy {
        name: "call_equity",
        chain: &[
            ConstraintType::CallWorstDay,
            ConstraintType::CallSpacing,
            ConstraintType::CallWeekdayBalance,
            ConstraintType::CallPreference,
        ],
    },
    WeightHierarchy {
        name: "workload",
        chain: &[ConstraintType::WorkloadBalance, ConstraintType::BlockPreference],
    },
    WeightHierarchy {
        name: "resilience",
        chain: &[
            ConstraintType::ResilienceN1Coverage,
            ConstraintType::ResilienceUtilizationBuffer,
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_respect_hierarchies() {
        for hierarchy in WEIGHT_HIERARCHIES {
            for pair in hierarchy.chain.windows(2) {
                assert!(
                    pair[0].declaration().default_weight > pair[1].declaration().default_weight,
                    "{}: {} <= {}",
                    hierarchy.name,
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn test_profiles() {
        let core = ConstraintType::for_profile(ConstraintProfile::Core);
        let resilience = ConstraintType::for_profile(ConstraintProfile::Resilience);
        assert_eq!(resilience.len(), ConstraintType::ALL.len());
        assert!(core.contains(&ConstraintType::PostDeploymentRecovery));
        assert!(core.contains(&ConstraintType::PostCallRest));
        assert!(!core.contains(&ConstraintType::ResilienceN1Coverage));
        assert!(core.iter().all(|t| resilience.contains(t)));
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "call-worst-day".parse::<ConstraintType>().unwrap(),
            ConstraintType::CallWorstDay
        );
        assert!("nope".parse::<ConstraintType>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        for t in ConstraintType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }
}
