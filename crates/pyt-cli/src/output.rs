use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Left-aligned columns separated by two spaces, trailing blanks trimmed.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let widths = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(String::len)
                .fold(h.len(), usize::max)
        })
        .collect::<Vec<_>>();

    print_row(headers.iter().copied(), &widths);
    print_row(widths.iter().map(|&w| "-".repeat(w)), &widths);
    for row in &rows {
        print_row(row.iter().map(String::as_str), &widths);
    }
}

fn print_row<I, S>(cells: I, widths: &[usize])
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = cells
        .into_iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{:w$}", cell.as_ref()))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", line.trim_end());
}

/// `- item` lines under a heading; nothing when `items` is empty.
pub fn print_list<S: AsRef<str>>(heading: &str, items: &[S]) {
    if items.is_empty() {
        return;
    }
    println!("{heading}:");
    for item in items {
        println!("  - {}", item.as_ref());
    }
}
