//! Shared aggregate expression builder.

use super::dialect::helpers;
use crate::model::types::MetricType;

/// Aggregate expression for `metric_type` over `sql`.
///
/// Dialects override percentile and median forms and delegate everything
/// else here. Non-aggregate kinds pass the expression through unchanged.
pub fn default_metric_sql(sql: &str, metric_type: MetricType) -> String {
    match metric_type {
        MetricType::Average => format!("AVG({})", sql),
        MetricType::Count => format!("COUNT({})", sql),
        MetricType::CountDistinct => format!("COUNT(DISTINCT {})", sql),
        MetricType::Sum => format!("SUM({})", sql),
        MetricType::Min => format!("MIN({})", sql),
        MetricType::Max => format!("MAX({})", sql),
        MetricType::Percentile | MetricType::Median => {
            helpers::percentile_cont_within_group(sql, 50.0)
        }
        MetricType::Number | MetricType::String | MetricType::Date | MetricType::Boolean => {
            sql.to_string()
        }
    }
}
