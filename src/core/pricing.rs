//! Price and condition heuristic.
//!
//! A keyword rules table, not a model: the title and description are scanned
//! for Arabic condition words (best bucket first, first match wins), the bucket
//! gives a discount, and a per-category factor scales the result. The output is
//! capped at the platform ceiling. Recyclable categories additionally get a
//! recycling idea from a second keyword table.
//!
//! Bump [`RULES_VERSION`] whenever a table below changes.

use crate::entities::{Category, Condition};
use serde::Serialize;

/// Version of the keyword tables and factors below.
pub const RULES_VERSION: u32 = 1;

/// Highest price any listing may carry, in EGP.
pub const PRICE_CEILING: f64 = 500.0;

/// Smallest suggestion the heuristic produces, one piastre.
pub const MIN_SUGGESTED_PRICE: f64 = 0.01;

struct ConditionRule {
    condition: Condition,
    keywords: &'static [&'static str],
}

// Ordered best to worst.
const CONDITION_RULES: &[ConditionRule] = &[
    ConditionRule {
        condition: Condition::Excellent,
        keywords: &["جديد", "ممتاز", "زيرو", "لم يستخدم", "متبرشم"],
    },
    ConditionRule {
        condition: Condition::VeryGood,
        keywords: &["استعمال خفيف", "جيد جدا", "جيد جداً", "جيدة جدا", "جيدة جداً", "نظيف"],
    },
    ConditionRule {
        condition: Condition::Good,
        keywords: &["جيد", "مستعمل", "كويس"],
    },
    ConditionRule {
        condition: Condition::Fair,
        keywords: &["متوسط", "خدوش", "خدش", "بعض العيوب"],
    },
    ConditionRule {
        condition: Condition::Acceptable,
        keywords: &["قديم", "مقبول", "يحتاج صيانة", "تالف", "مكسور"],
    },
];

struct RecycleRule {
    keywords: &'static [&'static str],
    idea: &'static str,
}

const RECYCLE_RULES: &[RecycleRule] = &[
    RecycleRule {
        keywords: &["خشب"],
        idea: "اعمل منه رفوف أو صناديق تخزين خشبية",
    },
    RecycleRule {
        keywords: &["كرسي"],
        idea: "جدد الكرسي بقماش جديد أو حوله لحامل نباتات",
    },
    RecycleRule {
        keywords: &["ترابيزة", "طاولة"],
        idea: "حول الطاولة لمكتب صغير أو ركن قهوة",
    },
    RecycleRule {
        keywords: &["دولاب", "خزانة"],
        idea: "استخدم الأبواب والأرفف في عمل مكتبة حائط",
    },
    RecycleRule {
        keywords: &["سرير"],
        idea: "حول خشب السرير لبنش أو كنبة خارجية",
    },
    RecycleRule {
        keywords: &["كنبة", "كنب"],
        idea: "استخدم الإسفنج والقماش في عمل وسائد أرضية",
    },
    RecycleRule {
        keywords: &["مرتبة"],
        idea: "استخدم الإسفنج في حشو وسائد أو سرير للحيوانات الأليفة",
    },
    RecycleRule {
        keywords: &["زجاج", "ازاز", "إزاز"],
        idea: "اعمل منها فازات أو برطمانات تخزين",
    },
    RecycleRule {
        keywords: &["بلاستيك"],
        idea: "اعمل منه أصص زرع أو منظمات أدراج",
    },
    RecycleRule {
        keywords: &["حديد", "معدن", "ألومنيوم", "الومنيوم"],
        idea: "سلمه لمركز تدوير المعادن أو اعمل منه حوامل",
    },
    RecycleRule {
        keywords: &["موبايل", "تليفون", "هاتف"],
        idea: "استخدمه ككاميرا مراقبة أو مشغل موسيقى",
    },
    RecycleRule {
        keywords: &["لاب توب", "لابتوب", "كمبيوتر"],
        idea: "استخدم القطع في جهاز منزلي أو سلمه لنقطة تدوير إلكترونيات",
    },
    RecycleRule {
        keywords: &["شاشة", "تلفزيون"],
        idea: "استخدمها كشاشة عرض صور أو إطار رقمي",
    },
    RecycleRule {
        keywords: &["سماعة", "سماعات"],
        idea: "اعمل منها سماعة بلوتوث منزلية",
    },
    RecycleRule {
        keywords: &["كابل", "شاحن"],
        idea: "سلمها لنقطة تدوير الإلكترونيات لاستخراج النحاس",
    },
    RecycleRule {
        keywords: &["بطارية", "بطاريات"],
        idea: "سلمها لنقطة جمع البطاريات الآمنة",
    },
    RecycleRule {
        keywords: &["لمبة", "نجفة", "أباجورة", "اباجورة"],
        idea: "حولها لوحدة إضاءة ديكور جديدة",
    },
    RecycleRule {
        keywords: &["كاوتش", "إطار عربية"],
        idea: "اعمل منه أصيص زرع أو مقعد للحديقة",
    },
    RecycleRule {
        keywords: &["كرتون", "ورق"],
        idea: "اعمل منه صناديق تنظيم أو سلمه لتدوير الورق",
    },
    RecycleRule {
        keywords: &["قماش", "ستارة", "ستائر"],
        idea: "اعمل منه شنط قماش أو أغطية وسائد",
    },
];

/// Discount fraction applied for a condition bucket.
#[must_use]
pub const fn discount_for(condition: Condition) -> f64 {
    match condition {
        Condition::Excellent => 0.20,
        Condition::VeryGood => 0.35,
        Condition::Good => 0.50,
        Condition::Fair => 0.60,
        Condition::Acceptable => 0.75,
    }
}

/// Multiplier reflecting resale demand per category.
#[must_use]
pub const fn category_factor(category: Category) -> f64 {
    match category {
        Category::Furniture => 1.0,
        Category::Books | Category::Toys => 0.7,
        Category::Clothes => 0.6,
        Category::Electronics | Category::Other => 0.8,
    }
}

/// Bucket assumed when no condition keyword is found.
#[must_use]
pub const fn default_condition(category: Category) -> Condition {
    match category {
        Category::Books => Condition::VeryGood,
        Category::Furniture
        | Category::Electronics
        | Category::Clothes
        | Category::Toys
        | Category::Other => Condition::Good,
    }
}

/// Whether recycling ideas are offered for this category.
#[must_use]
pub const fn is_recyclable(category: Category) -> bool {
    matches!(
        category,
        Category::Furniture | Category::Electronics | Category::Other
    )
}

const fn fallback_recycle_idea(category: Category) -> Option<&'static str> {
    match category {
        Category::Furniture => Some("فك القطعة واستخدم الخامات في مشروع ديكور منزلي"),
        Category::Electronics => Some("سلمه لأقرب نقطة تدوير إلكترونيات"),
        Category::Other => Some("افرز الخامات وسلمها لأقرب مركز تدوير"),
        Category::Books | Category::Clothes | Category::Toys => None,
    }
}

fn haystack(title: &str, description: &str) -> String {
    format!("{title} {description}").to_lowercase()
}

/// Picks the condition bucket for the given text, falling back to the
/// category default.
#[must_use]
pub fn detect_condition(title: &str, description: &str, category: Category) -> Condition {
    let text = haystack(title, description);
    CONDITION_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| text.contains(kw)))
        .map_or_else(|| default_condition(category), |rule| rule.condition)
}

/// Recycling suggestion for recyclable categories; `None` otherwise.
#[must_use]
pub fn recycle_idea(title: &str, description: &str, category: Category) -> Option<&'static str> {
    if !is_recyclable(category) {
        return None;
    }
    let text = haystack(title, description);
    RECYCLE_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| text.contains(kw)))
        .map(|rule| rule.idea)
        .or_else(|| fallback_recycle_idea(category))
}

/// Whole-percent discount of `price` relative to `original`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn discount_percentage(original: f64, price: f64) -> i32 {
    if original <= 0.0 {
        return 0;
    }
    ((original - price) / original * 100.0).round() as i32
}

/// Result of [`analyze_product`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAnalysis {
    /// Rules table version that produced this result
    pub rules_version: u32,
    /// Detected condition bucket
    pub condition: Condition,
    /// Arabic label of the bucket
    pub condition_label: &'static str,
    /// Discount fraction of the bucket
    pub discount: f64,
    /// Suggested asking price in piastre precision, at most [`PRICE_CEILING`]
    pub suggested_price: f64,
    /// Discount actually obtained after clamping, in whole percent
    pub discount_percentage: i32,
    /// Whether the category accepts recycling
    pub can_recycle: bool,
    /// Recycling suggestion, if any
    pub recycle_idea: Option<String>,
}

/// Suggests a condition, price and recycling idea for a listing.
///
/// Deterministic: the same input always yields the same output.
#[must_use]
pub fn analyze_product(
    title: &str,
    description: &str,
    category: Category,
    original_price: f64,
) -> ProductAnalysis {
    let condition = detect_condition(title, description, category);
    let discount = discount_for(condition);
    let raw = original_price * (1.0 - discount) * category_factor(category);
    // Never below one piastre and never above what the seller paid.
    let suggested_price = ((raw.min(PRICE_CEILING) * 100.0).round() / 100.0)
        .max(MIN_SUGGESTED_PRICE)
        .min(original_price);

    ProductAnalysis {
        rules_version: RULES_VERSION,
        condition,
        condition_label: condition.label(),
        discount,
        suggested_price,
        discount_percentage: discount_percentage(original_price, suggested_price),
        can_recycle: is_recyclable(category),
        recycle_idea: recycle_idea(title, description, category).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_new_furniture_at_ceiling() {
        let analysis = analyze_product("كنبة جديد", "", Category::Furniture, 500.0);
        assert_eq!(analysis.condition, Condition::Excellent);
        assert_eq!(analysis.condition_label, "ممتازة");
        assert_eq!(analysis.discount, 0.20);
        assert_eq!(analysis.suggested_price, 400.0);
        assert_eq!(analysis.discount_percentage, 20);
    }

    #[test]
    fn test_clamp_only_on_overflow() {
        let analysis = analyze_product("دولاب قديم", "", Category::Furniture, 500.0);
        assert_eq!(analysis.condition, Condition::Acceptable);
        assert_eq!(analysis.suggested_price, 125.0);
        assert_eq!(analysis.discount_percentage, 75);

        let over = analyze_product("ترابيزة جديد", "", Category::Furniture, 1000.0);
        assert_eq!(over.suggested_price, PRICE_CEILING);
        assert_eq!(over.discount_percentage, 50);
    }

    #[test]
    fn test_lightly_used_dress() {
        let analysis = analyze_product("فستان استعمال خفيف", "", Category::Clothes, 200.0);
        assert_eq!(analysis.condition, Condition::VeryGood);
        assert_eq!(analysis.suggested_price, 78.0);
        assert_eq!(analysis.discount_percentage, 61);
        assert!(!analysis.can_recycle);
        assert!(analysis.recycle_idea.is_none());
    }

    #[test]
    fn test_condition_buckets_first_match_wins() {
        let cases = [
            ("موبايل زيرو", "فيه خدوش بسيطة", Condition::Excellent),
            ("شنطة", "حالة جيدة جدا", Condition::VeryGood),
            ("شنطة", "مستعمل سنة", Condition::Good),
            ("مكتب", "عليه خدوش", Condition::Fair),
            ("مكتب", "يحتاج صيانة", Condition::Acceptable),
        ];
        for (title, description, expected) in cases {
            assert_eq!(
                detect_condition(title, description, Category::Other),
                expected,
                "{title} / {description}"
            );
        }
    }

    #[test]
    fn test_category_default_when_no_keyword() {
        assert_eq!(detect_condition("رواية", "", Category::Books), Condition::VeryGood);
        assert_eq!(detect_condition("عربية لعبة", "", Category::Toys), Condition::Good);
    }

    #[test]
    fn test_category_factors() {
        let cases = [
            (Category::Furniture, 50.0),
            (Category::Books, 35.0),
            (Category::Clothes, 30.0),
            (Category::Toys, 35.0),
            (Category::Electronics, 40.0),
            (Category::Other, 40.0),
        ];
        for (category, expected) in cases {
            // "مستعمل" is a good-bucket keyword in every category: 100 * 0.5 * factor
            let analysis = analyze_product("مستعمل", "", category, 100.0);
            assert_eq!(analysis.suggested_price, expected, "{category:?}");
        }
    }

    #[test]
    fn test_recycle_ideas() {
        let idea = recycle_idea("ترابيزة خشب", "", Category::Furniture);
        assert_eq!(idea, Some("اعمل منه رفوف أو صناديق تخزين خشبية"));

        let idea = recycle_idea("لاب توب", "الشاشة مكسورة", Category::Electronics);
        assert_eq!(
            idea,
            Some("استخدم القطع في جهاز منزلي أو سلمه لنقطة تدوير إلكترونيات")
        );

        assert!(recycle_idea("قميص قماش", "", Category::Clothes).is_none());
        assert!(recycle_idea("حاجة", "", Category::Other).is_some());
    }

    #[test]
    fn test_small_prices_keep_a_positive_suggestion() {
        let analysis = analyze_product("قميص قديم", "", Category::Clothes, 1.0);
        assert_eq!(analysis.condition, Condition::Acceptable);
        assert_eq!(analysis.suggested_price, 0.15);
        assert_eq!(analysis.discount_percentage, 85);

        let tiny = analyze_product("قميص قديم", "", Category::Clothes, 0.01);
        assert_eq!(tiny.suggested_price, MIN_SUGGESTED_PRICE);
        assert_eq!(tiny.discount_percentage, 0);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let first = analyze_product("كرسي مستعمل", "خشب زان", Category::Furniture, 320.0);
        for _ in 0..10 {
            assert_eq!(
                analyze_product("كرسي مستعمل", "خشب زان", Category::Furniture, 320.0),
                first
            );
        }
        assert_eq!(first.rules_version, RULES_VERSION);
    }

    #[test]
    fn test_discount_percentage_guards_zero_original() {
        assert_eq!(discount_percentage(0.0, 10.0), 0);
        assert_eq!(discount_percentage(200.0, 78.0), 61);
    }
}
