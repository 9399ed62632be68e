use chrono::{Datelike, NaiveDateTime};

const SPANISH_MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Long-form Spanish date for the profile view, e.g. `5 de febrero de 2025`.
pub fn format_registration_date(datetime: NaiveDateTime) -> String {
    let month = SPANISH_MONTHS[datetime.month0() as usize];
    format!("{} de {} de {}", datetime.day(), month, datetime.year())
}

/// Display stamp stored on each ledger entry, e.g. `05/02/2025 14:30`.
/// A display value only; ordering comes from the ledger sequence itself.
pub fn format_entry_date(datetime: NaiveDateTime) -> String {
    datetime.format("%d/%m/%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 5)
            .expect("valid date")
            .and_hms_opt(14, 30, 9)
            .expect("valid time")
    }

    #[test]
    fn registration_date_is_long_form_spanish() {
        assert_eq!(format_registration_date(sample()), "5 de febrero de 2025");
    }

    #[test]
    fn entry_date_is_day_first_with_minutes() {
        assert_eq!(format_entry_date(sample()), "05/02/2025 14:30");
    }

    #[test]
    fn december_maps_to_the_last_month_name() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid time");
        assert_eq!(format_registration_date(date), "31 de diciembre de 2024");
    }
}
