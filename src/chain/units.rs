//! APT <-> octa conversion without floating point.

use super::ChainError;

/// 1 APT = 10^8 octas.
pub const OCTAS_PER_APT: u64 = 100_000_000;
const DECIMALS: usize = 8;

/// Parse a decimal APT amount such as `"1.5"` or `"0.00000001"` into octas.
pub fn parse_apt_amount(input: &str) -> Result<u64, ChainError> {
    let err = |why: &str| ChainError::InvalidAmount(format!("'{}': {}", input, why));
    let s = input.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(err("empty"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(err("not a decimal number"));
    }
    if frac.len() > DECIMALS {
        return Err(err("APT has at most 8 decimal places"));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| err("too large"))?
    };
    let frac_octas: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = DECIMALS)
            .parse()
            .map_err(|_| err("not a decimal number"))?
    };

    whole
        .checked_mul(OCTAS_PER_APT)
        .and_then(|o| o.checked_add(frac_octas))
        .ok_or_else(|| err("too large"))
}

/// Format octas as an APT decimal string with trailing zeros removed.
pub fn format_octas(octas: u64) -> String {
    let whole = octas / OCTAS_PER_APT;
    let frac = octas % OCTAS_PER_APT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:08}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amounts() {
        assert_eq!(parse_apt_amount("1").unwrap(), 100_000_000);
        assert_eq!(parse_apt_amount("1.5").unwrap(), 150_000_000);
        assert_eq!(parse_apt_amount(".25").unwrap(), 25_000_000);
        assert_eq!(parse_apt_amount("0.00000001").unwrap(), 1);
        assert_eq!(parse_apt_amount(" 2. ").unwrap(), 200_000_000);
        assert_eq!(parse_apt_amount("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects() {
        for bad in ["", ".", "-1", "1e3", "0.000000001", "1,5", "abc", "184467440738"] {
            assert!(parse_apt_amount(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_format_octas() {
        assert_eq!(format_octas(0), "0");
        assert_eq!(format_octas(100_000_000), "1");
        assert_eq!(format_octas(150_000_000), "1.5");
        assert_eq!(format_octas(1), "0.00000001");
        assert_eq!(format_octas(1_234_567_890), "12.3456789");
    }
}
