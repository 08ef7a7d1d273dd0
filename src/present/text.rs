use prettytable::{format, Cell, Row, Table};

use super::is_right_aligned;
use crate::query::ResultTable;

/// Boxed table: key columns then metric columns, one group per row.
pub fn render_table(result: &ResultTable) -> String {
    let names = result.column_names();
    let right: Vec<bool> = names
        .iter()
        .map(|n| is_right_aligned(result.column_type(n)))
        .collect();

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(Row::new(names.iter().map(|n| Cell::new(n)).collect()));

    for row in result.rows() {
        let cells = row
            .iter()
            .zip(&right)
            .map(|(v, &r)| {
                let cell = Cell::new(&v.to_string());
                if r {
                    cell.style_spec("r")
                } else {
                    cell
                }
            })
            .collect();
        table.add_row(Row::new(cells));
    }

    let mut out = table.to_string();
    if result.num_rows() == 0 {
        out.push_str("(no rows)\n");
    }
    out
}
