use std::collections::HashMap;

use super::{format_number, BAR_WIDTH};

const SHADES: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

fn bar(v: f64, max: f64) -> String {
    let len = if max > 0.0 && v > 0.0 {
        ((v / max) * BAR_WIDTH as f64).round() as usize
    } else {
        0
    };
    "█".repeat(len.min(BAR_WIDTH))
}

fn width(labels: &[String]) -> usize {
    labels.iter().map(|l| l.chars().count()).max().unwrap_or(0)
}

/// One horizontal bar per label.
pub fn bar_chart(labels: &[String], values: &[Option<f64>]) -> String {
    let max = values.iter().flatten().fold(0.0_f64, |m, v| m.max(*v));
    let w = width(labels);
    let mut out = String::new();
    for (label, v) in labels.iter().zip(values) {
        let (b, shown) = match v {
            Some(v) => (bar(*v, max), format_number(*v)),
            None => (String::new(), "Undefined".to_string()),
        };
        out.push_str(&format!("{:<w$} | {} {}\n", label, b, shown, w = w));
    }
    out
}

/// Equal-width bins from min to max; the last bin is closed.
pub fn histogram(values: &[Option<f64>], weights: &[Option<f64>], bins: usize) -> String {
    let points: Vec<(f64, f64)> = values
        .iter()
        .zip(weights)
        .filter_map(|(v, w)| Some(((*v)?, (*w)?)))
        .collect();
    if points.is_empty() {
        return "(no data)\n".to_string();
    }

    let lo = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let hi = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let step = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

    let mut counts = vec![0.0_f64; bins];
    for (v, w) in &points {
        let idx = (((v - lo) / step).floor() as usize).min(bins - 1);
        counts[idx] += w;
    }

    let labels: Vec<String> = (0..bins)
        .map(|i| {
            let start = lo + step * i as f64;
            let end = start + step;
            let close = if i + 1 == bins { ']' } else { ')' };
            format!("[{}, {}{}", format_number(start), format_number(end), close)
        })
        .collect();
    let max = counts.iter().copied().fold(0.0_f64, f64::max);
    let w = width(&labels);

    let mut out = String::new();
    for (label, c) in labels.iter().zip(&counts) {
        out.push_str(&format!(
            "{:<w$} | {} {}\n",
            label,
            bar(*c, max),
            format_number(*c),
            w = w
        ));
    }
    out
}

/// Grid of `rows` × `cols` in first-seen order; repeated cells add up.
pub fn heatmap(rows: &[String], cols: &[String], values: &[Option<f64>]) -> String {
    let mut row_keys: Vec<&str> = Vec::new();
    let mut col_keys: Vec<&str> = Vec::new();
    let mut cells: HashMap<(usize, usize), f64> = HashMap::new();

    for ((r, c), v) in rows.iter().zip(cols).zip(values) {
        let ri = position_or_push(&mut row_keys, r);
        let ci = position_or_push(&mut col_keys, c);
        if let Some(v) = v {
            *cells.entry((ri, ci)).or_insert(0.0) += v;
        }
    }

    let max = cells.values().copied().fold(0.0_f64, f64::max);
    let text = |ri: usize, ci: usize| match cells.get(&(ri, ci)) {
        Some(v) => {
            let level = if max > 0.0 && *v > 0.0 {
                ((v / max) * (SHADES.len() - 1) as f64).round() as usize
            } else {
                0
            };
            format!("{} {}", SHADES[level.min(SHADES.len() - 1)], format_number(*v))
        }
        None => "-".to_string(),
    };

    let row_w = row_keys.iter().map(|k| k.chars().count()).max().unwrap_or(0);
    let col_w: Vec<usize> = col_keys
        .iter()
        .enumerate()
        .map(|(ci, k)| {
            (0..row_keys.len())
                .map(|ri| text(ri, ci).chars().count())
                .chain([k.chars().count()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = format!("{:<w$} |", "", w = row_w);
    for (k, w) in col_keys.iter().zip(&col_w) {
        out.push_str(&format!(" {:<w$} |", k, w = *w));
    }
    out.push('\n');
    for (ri, rk) in row_keys.iter().enumerate() {
        out.push_str(&format!("{:<w$} |", rk, w = row_w));
        for (ci, w) in col_w.iter().enumerate() {
            out.push_str(&format!(" {:<w$} |", text(ri, ci), w = *w));
        }
        out.push('\n');
    }
    out
}

fn position_or_push<'a>(keys: &mut Vec<&'a str>, key: &'a str) -> usize {
    match keys.iter().position(|k| *k == key) {
        Some(i) => i,
        None => {
            keys.push(key);
            keys.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_puts_the_maximum_in_the_last_bin() {
        let vals = [Some(0.0), Some(5.0), Some(10.0), None];
        let ones = [Some(1.0); 4];
        let out = histogram(&vals, &ones, 2);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("[0, 5)"));
        assert!(lines[1].starts_with("[5, 10]"));
        assert!(lines[0].ends_with(" 1"));
        assert!(lines[1].ends_with(" 2"));
    }

    #[test]
    fn single_valued_histogram_does_not_divide_by_zero() {
        let out = histogram(&[Some(3.0), Some(3.0)], &[Some(1.0), Some(1.0)], 4);
        assert_eq!(out.lines().count(), 4);
        assert!(out.lines().next().unwrap().ends_with(" 2"));
        assert_eq!(histogram(&[None], &[Some(1.0)], 3), "(no data)\n");
    }

    #[test]
    fn heatmap_marks_missing_cells() {
        let rows = vec!["a".to_string(), "b".to_string()];
        let cols = vec!["x".to_string(), "y".to_string()];
        let out = heatmap(&rows, &cols, &[Some(4.0), Some(1.0)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("@ 4"));
        assert!(lines[1].contains(" - "));
        assert!(lines[2].contains(". 1") || lines[2].contains(": 1"));
    }

    #[test]
    fn null_bar_values_are_undefined() {
        let out = bar_chart(&["x".to_string()], &[None]);
        assert_eq!(out, "x |  Undefined\n");
    }
}
