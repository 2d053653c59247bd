use crate::record::Record;

/// Formats one listing row: index, reservation mark, date, title, price
pub fn format_row(index: usize, record: &Record) -> String {
    let mark = if record.reserved { '*' } else { ' ' };
    let cover = if record.cover.is_some() { "" } else { " (no cover)" };
    format!(
        "{:>4} {} {:<10} {} / {} {}{}",
        index, mark, record.release_date, record.title, record.author, record.price, cover
    )
}

/// Prints the records in the given order, numbered from 1
pub fn print_listing(records: &[Record]) {
    for (i, record) in records.iter().enumerate() {
        println!("{}", format_row(i + 1, record));
    }
}
