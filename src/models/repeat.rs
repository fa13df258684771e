use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// 重复类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatKind {
    #[default]
    #[serde(alias = "none")]
    None,
    #[serde(alias = "daily")]
    Daily,
    #[serde(alias = "weekday")]
    Weekday,
    #[serde(alias = "weekly")]
    Weekly,
    #[serde(alias = "monthly")]
    Monthly,
    #[serde(alias = "yearly")]
    Annually,
    #[serde(alias = "regularly")]
    Regularly,
    #[serde(alias = "after-completion")]
    AfterCompletion,
}

impl RepeatKind {
    /// 选择器中的顺序
    pub const ALL: [RepeatKind; 8] = [
        RepeatKind::None,
        RepeatKind::Daily,
        RepeatKind::Weekday,
        RepeatKind::Weekly,
        RepeatKind::Monthly,
        RepeatKind::Annually,
        RepeatKind::Regularly,
        RepeatKind::AfterCompletion,
    ];

    /// 是否使用自定义的 frequency / unit
    pub fn is_custom(self) -> bool {
        matches!(self, RepeatKind::Regularly | RepeatKind::AfterCompletion)
    }
}

impl FromStr for RepeatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "none" | "never" => Ok(RepeatKind::None),
            "daily" => Ok(RepeatKind::Daily),
            "weekday" | "weekdays" => Ok(RepeatKind::Weekday),
            "weekly" => Ok(RepeatKind::Weekly),
            "monthly" => Ok(RepeatKind::Monthly),
            "annually" | "yearly" => Ok(RepeatKind::Annually),
            "regularly" => Ok(RepeatKind::Regularly),
            "after-completion" | "aftercompletion" => Ok(RepeatKind::AfterCompletion),
            other => Err(Error::InvalidRepeat(format!("unknown repeat kind '{}'", other))),
        }
    }
}

/// 自定义重复的单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatUnit {
    #[serde(alias = "minute")]
    Minute,
    #[serde(alias = "hour")]
    Hour,
    #[default]
    #[serde(alias = "day")]
    Day,
    #[serde(alias = "weekday")]
    Weekday,
    #[serde(alias = "week")]
    Week,
    #[serde(alias = "month")]
    Month,
    #[serde(alias = "year")]
    Year,
}

impl RepeatUnit {
    pub const ALL: [RepeatUnit; 7] = [
        RepeatUnit::Minute,
        RepeatUnit::Hour,
        RepeatUnit::Day,
        RepeatUnit::Weekday,
        RepeatUnit::Week,
        RepeatUnit::Month,
        RepeatUnit::Year,
    ];

    fn label(self) -> &'static str {
        match self {
            RepeatUnit::Minute => "minute",
            RepeatUnit::Hour => "hour",
            RepeatUnit::Day => "day",
            RepeatUnit::Weekday => "weekday",
            RepeatUnit::Week => "week",
            RepeatUnit::Month => "month",
            RepeatUnit::Year => "year",
        }
    }
}

impl FromStr for RepeatUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        RepeatUnit::ALL
            .into_iter()
            .find(|unit| unit.label() == singular)
            .ok_or_else(|| Error::InvalidRepeat(format!("unknown repeat unit '{}'", s)))
    }
}

/// 重复规则
///
/// 规则是不可变的值: 修改重复设置时总是构造新的规则并整体替换。
/// 持久化时编码为 JSON，只在存储边界进行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatRule {
    #[serde(rename = "type")]
    pub kind: RepeatKind,
    pub frequency: u32,
    pub unit: RepeatUnit,
    #[serde(rename = "endDate")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for RepeatRule {
    fn default() -> Self {
        Self {
            kind: RepeatKind::None,
            frequency: 1,
            unit: RepeatUnit::Day,
            end_date: None,
        }
    }
}

impl RepeatRule {
    pub fn new(kind: RepeatKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// 每隔 frequency 个 unit 重复一次
    pub fn regularly(frequency: u32, unit: RepeatUnit) -> Self {
        Self {
            kind: RepeatKind::Regularly,
            frequency,
            unit,
            end_date: None,
        }
    }

    /// 完成后再隔 frequency 个 unit 重复
    pub fn after_completion(frequency: u32, unit: RepeatUnit) -> Self {
        Self {
            kind: RepeatKind::AfterCompletion,
            frequency,
            unit,
            end_date: None,
        }
    }

    pub fn until(self, end_date: DateTime<Utc>) -> Self {
        Self {
            end_date: Some(end_date),
            ..self
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.kind != RepeatKind::None
    }

    /// frequency 为 0 时按 1 处理
    pub fn effective_frequency(&self) -> u32 {
        self.frequency.max(1)
    }

    /// 编码为存储格式
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// 解码失败或缺失时退回到默认规则（不重复）
    pub fn decode_or_default(data: Option<&str>) -> Self {
        match data {
            Some(data) => Self::decode(data).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable repeat info: {}", e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

impl fmt::Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RepeatKind::None => return f.write_str("Never"),
            RepeatKind::Daily => f.write_str("Daily")?,
            RepeatKind::Weekday => f.write_str("Every weekday")?,
            RepeatKind::Weekly => f.write_str("Weekly")?,
            RepeatKind::Monthly => f.write_str("Monthly")?,
            RepeatKind::Annually => f.write_str("Annually")?,
            RepeatKind::Regularly | RepeatKind::AfterCompletion => {
                let n = self.effective_frequency();
                write!(f, "Every {} {}", n, self.unit.label())?;
                if n != 1 {
                    f.write_str("s")?;
                }
                if self.kind == RepeatKind::AfterCompletion {
                    f.write_str(" after completion")?;
                }
            }
        }

        if let Some(end) = self.end_date {
            write!(f, " until {}", end.format("%Y-%m-%d"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_rule_does_not_repeat() {
        let rule = RepeatRule::default();
        assert_eq!(rule.kind, RepeatKind::None);
        assert_eq!(rule.frequency, 1);
        assert_eq!(rule.unit, RepeatUnit::Day);
        assert!(rule.end_date.is_none());
        assert!(!rule.is_repeating());
    }

    #[test]
    fn test_encode_decode_keeps_all_fields() {
        let end = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        let rule = RepeatRule::after_completion(3, RepeatUnit::Week).until(end);

        let encoded = rule.encode().unwrap();
        assert!(encoded.contains("\"type\":\"AfterCompletion\""));
        assert!(encoded.contains("\"endDate\""));
        assert_eq!(RepeatRule::decode(&encoded).unwrap(), rule);
    }

    #[test]
    fn test_decode_accepts_lowercase_names() {
        let rule =
            RepeatRule::decode(r#"{"type":"after-completion","frequency":2,"unit":"hour"}"#)
                .unwrap();
        assert_eq!(rule.kind, RepeatKind::AfterCompletion);
        assert_eq!(rule.unit, RepeatUnit::Hour);
        assert_eq!(rule.frequency, 2);

        let yearly = RepeatRule::decode(r#"{"type":"yearly"}"#).unwrap();
        assert_eq!(yearly.kind, RepeatKind::Annually);
        assert_eq!(yearly.frequency, 1);
    }

    #[test]
    fn test_decode_or_default_on_garbage() {
        assert_eq!(RepeatRule::decode_or_default(Some("not json")), RepeatRule::default());
        assert_eq!(
            RepeatRule::decode_or_default(Some(r#"{"type":"Fortnightly"}"#)),
            RepeatRule::default()
        );
        assert_eq!(RepeatRule::decode_or_default(None), RepeatRule::default());
    }

    #[test]
    fn test_only_regularly_and_after_completion_are_custom() {
        let custom: Vec<_> = RepeatKind::ALL.into_iter().filter(|k| k.is_custom()).collect();
        assert_eq!(custom, vec![RepeatKind::Regularly, RepeatKind::AfterCompletion]);
    }

    #[test]
    fn test_effective_frequency() {
        assert_eq!(RepeatRule::regularly(0, RepeatUnit::Day).effective_frequency(), 1);
        assert_eq!(RepeatRule::regularly(4, RepeatUnit::Day).effective_frequency(), 4);
    }

    #[test]
    fn test_parse_kind_and_unit() {
        assert_eq!("after-completion".parse::<RepeatKind>().unwrap(), RepeatKind::AfterCompletion);
        assert_eq!("Yearly".parse::<RepeatKind>().unwrap(), RepeatKind::Annually);
        assert!("sometimes".parse::<RepeatKind>().is_err());

        assert_eq!("weeks".parse::<RepeatUnit>().unwrap(), RepeatUnit::Week);
        assert_eq!("Weekday".parse::<RepeatUnit>().unwrap(), RepeatUnit::Weekday);
        assert!("fortnight".parse::<RepeatUnit>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(RepeatRule::default().to_string(), "Never");
        assert_eq!(RepeatRule::new(RepeatKind::Weekday).to_string(), "Every weekday");
        assert_eq!(RepeatRule::regularly(1, RepeatUnit::Day).to_string(), "Every 1 day");
        assert_eq!(
            RepeatRule::after_completion(3, RepeatUnit::Hour).to_string(),
            "Every 3 hours after completion"
        );

        let end = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(
            RepeatRule::new(RepeatKind::Monthly).until(end).to_string(),
            "Monthly until 2025-12-31"
        );
    }
}
