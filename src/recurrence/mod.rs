// 重复任务的日期计算
// 纯函数，没有 I/O 也没有共享状态；日历取自传入日期的时区

use chrono::{DateTime, Datelike, Days, Duration, LocalResult, Months, NaiveDateTime, TimeZone, Utc, Weekday};

use crate::models::{RepeatKind, RepeatRule, RepeatUnit, Task};

/// 日历步进
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    /// 跳过周六、周日
    Weekdays(u32),
    Months(u32),
    Years(u32),
}

impl Step {
    /// 根据重复规则得到步进，不重复时返回 None
    pub fn for_rule(rule: &RepeatRule) -> Option<Step> {
        let amount = rule.effective_frequency();

        let step = match rule.kind {
            RepeatKind::None => return None,
            RepeatKind::Daily => Step::Days(1),
            RepeatKind::Weekday => Step::Weekdays(1),
            RepeatKind::Weekly => Step::Days(7),
            RepeatKind::Monthly => Step::Months(1),
            RepeatKind::Annually => Step::Years(1),
            RepeatKind::Regularly | RepeatKind::AfterCompletion => match rule.unit {
                RepeatUnit::Minute => Step::Minutes(amount),
                RepeatUnit::Hour => Step::Hours(amount),
                RepeatUnit::Day => Step::Days(amount),
                RepeatUnit::Weekday => Step::Weekdays(amount),
                // 按天计算，不依赖日历对“周”的定义
                RepeatUnit::Week => Step::Days(amount.checked_mul(7)?),
                RepeatUnit::Month => Step::Months(amount),
                RepeatUnit::Year => Step::Years(amount),
            },
        };
        Some(step)
    }
}

/// 续期结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalResult {
    /// 已推进到下一周期，任务重新变为未完成
    Renewed {
        due_at: DateTime<Utc>,
        remind_at: Option<DateTime<Utc>>,
    },
    /// 不重复，保持完成
    NotRepeating,
    /// 已超过结束日期，保持完成
    Expired,
    /// 任务本来就是完成状态
    AlreadyCompleted,
}

impl RenewalResult {
    pub fn is_renewed(&self) -> bool {
        matches!(self, RenewalResult::Renewed { .. })
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// 把本地时间解析回时区内的时刻
///
/// 重叠时取较早的时刻，落在夏令时空隙里时顺延一小时。
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        // 两个结果的先后顺序因时区实现而异
        LocalResult::Ambiguous(a, b) => Some(if a <= b { a } else { b }),
        LocalResult::None => {
            let shifted = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&shifted).earliest()
        }
    }
}

/// 向后数 amount 个工作日
///
/// 逐日前进，只有周一到周五才计数。
pub fn add_weekdays<Tz: TimeZone>(date: &DateTime<Tz>, amount: u32) -> Option<DateTime<Tz>> {
    let mut naive = date.naive_local();
    let mut remaining = amount;

    // 任意连续 7 天恰好包含 5 个工作日
    while remaining > 5 {
        naive = naive.checked_add_days(Days::new(7))?;
        remaining -= 5;
    }

    while remaining > 0 {
        naive = naive.checked_add_days(Days::new(1))?;
        if !is_weekend(naive.weekday()) {
            remaining -= 1;
        }
    }

    resolve_local(&date.timezone(), naive)
}

/// 按步进推进日期，溢出时返回 None
pub fn advance<Tz: TimeZone>(date: &DateTime<Tz>, step: Step) -> Option<DateTime<Tz>> {
    let calendar = |naive: Option<NaiveDateTime>| resolve_local(&date.timezone(), naive?);

    match step {
        Step::Minutes(n) => date.clone().checked_add_signed(Duration::minutes(i64::from(n))),
        Step::Hours(n) => date.clone().checked_add_signed(Duration::hours(i64::from(n))),
        Step::Days(n) => calendar(date.naive_local().checked_add_days(Days::new(u64::from(n)))),
        Step::Weekdays(n) => add_weekdays(date, n),
        Step::Months(n) => calendar(date.naive_local().checked_add_months(Months::new(n))),
        Step::Years(n) => {
            let months = n.checked_mul(12)?;
            calendar(date.naive_local().checked_add_months(Months::new(months)))
        }
    }
}

/// 计算下一次发生的时间
///
/// `AfterCompletion` 以完成时间为基准（未提供时退回到 `anchor`），
/// 其余类型以 `anchor` 为基准。超过 `end_date` 或日期溢出时返回 None。
pub fn next_occurrence<Tz: TimeZone>(
    rule: &RepeatRule,
    anchor: &DateTime<Tz>,
    completion_time: Option<&DateTime<Tz>>,
) -> Option<DateTime<Tz>> {
    let step = Step::for_rule(rule)?;

    let base = match (rule.kind, completion_time) {
        (RepeatKind::AfterCompletion, Some(completed)) => completed,
        _ => anchor,
    };

    let next = advance(base, step)?;

    if let Some(end) = rule.end_date {
        if next.with_timezone(&Utc) > end {
            return None;
        }
    }

    Some(next)
}

/// 任务完成后的续期
///
/// 如果规则仍然有效，推进截止时间和提醒时间并把任务改回未完成；
/// 否则任务保持完成状态，日期不变。
pub fn renew_on_completion<Tz: TimeZone>(task: &mut Task, now: &DateTime<Tz>) -> RenewalResult {
    let rule = task.repeat;
    let tz = now.timezone();
    let anchor = task
        .due_at
        .map(|due| due.with_timezone(&tz))
        .unwrap_or_else(|| now.clone());

    let Some(next) = next_occurrence(&rule, &anchor, Some(now)) else {
        if rule.is_repeating() {
            tracing::debug!("Task {:?} repeat ended, stays completed", task.id);
            return RenewalResult::Expired;
        }
        return RenewalResult::NotRepeating;
    };

    if let (Some(remind_at), Some(step)) = (task.remind_at, Step::for_rule(&rule)) {
        let base = if rule.kind == RepeatKind::AfterCompletion {
            now.clone()
        } else {
            remind_at.with_timezone(&tz)
        };
        task.remind_at = advance(&base, step).map(|d| d.with_timezone(&Utc));
        if task.remind_at.is_none() {
            tracing::warn!("Reminder of task {:?} could not be advanced, cleared", task.id);
        }
    }

    let due_at = next.with_timezone(&Utc);
    task.due_at = Some(due_at);
    task.completed_at = None;
    task.updated_at = now.with_timezone(&Utc);

    tracing::debug!("Task {:?} renewed, next due {}", task.id, due_at.to_rfc3339());

    RenewalResult::Renewed {
        due_at,
        remind_at: task.remind_at,
    }
}

/// 从某个时间开始依次列出后续的发生时间
///
/// 对 `AfterCompletion` 假设每次都在到期时完成。
pub fn occurrences<Tz: TimeZone>(rule: RepeatRule, start: DateTime<Tz>) -> Occurrences<Tz> {
    Occurrences {
        rule,
        current: Some(start),
    }
}

pub struct Occurrences<Tz: TimeZone> {
    rule: RepeatRule,
    current: Option<DateTime<Tz>>,
}

impl<Tz: TimeZone> Iterator for Occurrences<Tz> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        let next = next_occurrence(&self.rule, &current, Some(&current))?;
        // 必须严格前进
        if next <= current {
            return None;
        }
        self.current = Some(next.clone());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_step_for_fixed_kinds() {
        assert_eq!(Step::for_rule(&RepeatRule::default()), None);
        assert_eq!(Step::for_rule(&RepeatRule::new(RepeatKind::Daily)), Some(Step::Days(1)));
        assert_eq!(Step::for_rule(&RepeatRule::new(RepeatKind::Weekly)), Some(Step::Days(7)));
        assert_eq!(Step::for_rule(&RepeatRule::new(RepeatKind::Weekday)), Some(Step::Weekdays(1)));
        assert_eq!(Step::for_rule(&RepeatRule::new(RepeatKind::Monthly)), Some(Step::Months(1)));
        assert_eq!(Step::for_rule(&RepeatRule::new(RepeatKind::Annually)), Some(Step::Years(1)));
    }

    #[test]
    fn test_fixed_kinds_ignore_frequency_and_unit() {
        let rule = RepeatRule {
            kind: RepeatKind::Daily,
            frequency: 9,
            unit: RepeatUnit::Year,
            end_date: None,
        };
        assert_eq!(Step::for_rule(&rule), Some(Step::Days(1)));
    }

    #[test]
    fn test_step_for_custom_units() {
        assert_eq!(
            Step::for_rule(&RepeatRule::regularly(2, RepeatUnit::Week)),
            Some(Step::Days(14))
        );
        assert_eq!(
            Step::for_rule(&RepeatRule::after_completion(0, RepeatUnit::Hour)),
            Some(Step::Hours(1))
        );
        assert_eq!(
            Step::for_rule(&RepeatRule::regularly(u32::MAX, RepeatUnit::Week)),
            None
        );
    }

    #[test]
    fn test_add_weekdays_skips_weekend() {
        // 2024-03-01 是周五
        let friday = utc(2024, 3, 1, 9, 0);
        assert_eq!(add_weekdays(&friday, 1), Some(utc(2024, 3, 4, 9, 0)));
        assert_eq!(add_weekdays(&friday, 5), Some(utc(2024, 3, 8, 9, 0)));
        assert_eq!(add_weekdays(&friday, 0), Some(friday));

        let saturday = utc(2024, 3, 2, 9, 0);
        assert_eq!(add_weekdays(&saturday, 1), Some(utc(2024, 3, 4, 9, 0)));
    }

    #[test]
    fn test_add_weekdays_week_jump_matches_walk() {
        let start = utc(2024, 3, 6, 8, 30);
        let mut walked = start;
        for _ in 0..23 {
            walked = add_weekdays(&walked, 1).unwrap();
        }
        assert_eq!(add_weekdays(&start, 23), Some(walked));
    }

    #[test]
    fn test_advance_overflow_is_none() {
        let max = DateTime::<Utc>::MAX_UTC;
        assert_eq!(advance(&max, Step::Days(1)), None);
        assert_eq!(advance(&max, Step::Minutes(1)), None);
        assert_eq!(advance(&max, Step::Years(1)), None);
    }

    #[test]
    fn test_occurrences_stop_at_end_date() {
        let start = utc(2024, 1, 1, 10, 0);
        let rule = RepeatRule::new(RepeatKind::Daily).until(utc(2024, 1, 4, 10, 0));
        let dates: Vec<_> = occurrences(rule, start).collect();
        assert_eq!(
            dates,
            vec![utc(2024, 1, 2, 10, 0), utc(2024, 1, 3, 10, 0), utc(2024, 1, 4, 10, 0)]
        );
    }

    #[test]
    fn test_occurrences_none_rule_is_empty() {
        assert_eq!(occurrences(RepeatRule::default(), utc(2024, 1, 1, 0, 0)).count(), 0);
    }
}
