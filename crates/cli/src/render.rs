//! Plain-text rendering of dashboard projections

use buildboard_core::{x_accessor, y_accessor, ChartSeries, SelectionState, SeriesSet, TickFormat};

/// Render one series set as a markdown table, one row per build
pub fn series_table(title: &str, set: &SeriesSet, format: TickFormat) -> String {
    let mut lines = Vec::new();

    lines.push(format!("## {}\n", title));
    lines.push(format!("| Build | {} | {} |", set.passed().key, set.failed().key));
    lines.push("|-------|--------|--------|".to_string());

    for point in &set.passed().values {
        let build = x_accessor(point);
        let failed = set
            .failed()
            .find(point.build())
            .map(|p| format.format(y_accessor(p)))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "| {} | {} | {} |",
            build,
            format.format(y_accessor(point)),
            failed
        ));
    }

    lines.join("\n")
}

/// Render both timelines
pub fn timeline(series: &ChartSeries, format: TickFormat) -> String {
    if series.is_empty() {
        return "No builds available.".to_string();
    }

    [
        series_table("Pass rate", &series.relative, format),
        series_table("Test counts", &series.absolute, format),
    ]
    .join("\n\n")
}

/// Render the breakdown panels of a selection
pub fn selection(state: &SelectionState) -> String {
    let mut lines = Vec::new();

    lines.push(format!("## Build {}\n", state.build));

    for panel in state.panels() {
        lines.push(format!(
            "### By {} ({} labels, {:.1}px each)\n",
            panel.view.dimension, panel.cardinality, panel.item_width
        ));

        if panel.view.is_empty() {
            lines.push("No data.\n".to_string());
            continue;
        }

        lines.push("| Label | Passed | Failed |".to_string());
        lines.push("|-------|--------|--------|".to_string());
        for (label, [passed, failed]) in panel.view.iter() {
            lines.push(format!(
                "| {} | {} | {} |",
                label,
                y_accessor(passed),
                y_accessor(failed)
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildboard_core::{
        absolute_series, relative_series, BuildId, BuildRecord, Dashboard, DashboardConfig,
        Dimension, PassFail, RecordSource,
    };

    fn records() -> Vec<BuildRecord> {
        vec![
            BuildRecord::new("1200", 8, 2).with_breakdown(
                Dimension::Platform,
                [("Linux", PassFail::new(8, 2))].into_iter().collect(),
            ),
            BuildRecord::new("1201", 10, 0),
        ]
    }

    #[test]
    fn test_series_table() {
        let table = series_table("Counts", &absolute_series(&records()), TickFormat::Integer);

        assert!(table.contains("| Build | Passed | Failed |"));
        assert!(table.contains("| 1200 | 8 | 2 |"));
        assert!(table.contains("| 1201 | 10 | 0 |"));
    }

    #[test]
    fn test_timeline_empty() {
        let series = ChartSeries {
            relative: relative_series(&[]),
            absolute: absolute_series(&[]),
        };
        assert_eq!(timeline(&series, TickFormat::General), "No builds available.");
    }

    #[test]
    fn test_timeline_relative_headers() {
        let recs = records();
        let series = ChartSeries {
            relative: relative_series(&recs),
            absolute: absolute_series(&recs),
        };
        let text = timeline(&series, TickFormat::General);
        assert!(text.contains("| Build | Passed, % | Failed, % |"));
        assert!(text.contains("| 1200 | 80 | 20 |"));
    }

    #[tokio::test]
    async fn test_selection_panels() {
        let dashboard = Dashboard::load(RecordSource::new(records()), DashboardConfig::default())
            .await
            .unwrap();
        dashboard.select(BuildId::from("1200")).await.unwrap();

        let text = selection(&dashboard.selection().unwrap());
        assert!(text.contains("## Build 1200"));
        assert!(text.contains("### By platform (1 labels, 384.0px each)"));
        assert!(text.contains("| Linux | 8 | 2 |"));
        assert!(text.contains("### By category (0 labels, 0.0px each)"));
    }
}
