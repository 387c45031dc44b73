//! Binary wire format of PostgreSQL `NUMERIC`
//!
//! Layout: `ndigits: i16`, `weight: i16`, `sign: u16`, `dscale: u16`, then
//! `ndigits` base-10000 groups as `u16`. The value is
//! `sum(group[i] * 10000^(weight - i))`, printed with `dscale` fraction digits.

type BoxError = Box<dyn std::error::Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;
const MAX_DSCALE: usize = 0x3FFF;

fn header(ndigits: i16, weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + ndigits.max(0) as usize * 2);
    out.extend_from_slice(&ndigits.to_be_bytes());
    out.extend_from_slice(&weight.to_be_bytes());
    out.extend_from_slice(&sign.to_be_bytes());
    out.extend_from_slice(&dscale.to_be_bytes());
    out
}

/// Encode a plain decimal literal (`-12.50`, `0.001`, `NaN`) into NUMERIC binary form.
pub fn encode_numeric(text: &str) -> Result<Vec<u8>, BoxError> {
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" => return Ok(header(0, 0, NUMERIC_NAN, 0)),
        "infinity" | "+infinity" | "inf" => return Ok(header(0, 0, NUMERIC_PINF, 0)),
        "-infinity" | "-inf" => return Ok(header(0, 0, NUMERIC_NINF, 0)),
        _ => {}
    }

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(format!("invalid numeric literal: {text:?}").into());
    }

    let dscale = frac_part.len();
    if dscale > MAX_DSCALE {
        return Err(format!("numeric scale {dscale} is out of range").into());
    }

    let int_part = int_part.trim_start_matches('0');
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;

    let mut digits_text = String::with_capacity(int_pad + int_part.len() + dscale + frac_pad);
    digits_text.push_str(&"0".repeat(int_pad));
    digits_text.push_str(int_part);
    let int_groups = digits_text.len() / 4;
    digits_text.push_str(frac_part);
    digits_text.push_str(&"0".repeat(frac_pad));

    let mut groups: Vec<u16> = digits_text
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0')))
        .collect();

    let mut weight = int_groups as i64 - 1;
    let leading_zeros = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading_zeros);
    weight -= leading_zeros as i64;
    while groups.last() == Some(&0) {
        groups.pop();
    }

    if groups.is_empty() {
        return Ok(header(0, 0, NUMERIC_POS, dscale as u16));
    }

    let ndigits = i16::try_from(groups.len())
        .map_err(|_| format!("numeric literal has too many digits: {text:?}"))?;
    let weight = i16::try_from(weight)
        .map_err(|_| format!("numeric literal is out of range: {text:?}"))?;
    let sign = if negative { NUMERIC_NEG } else { NUMERIC_POS };

    let mut out = header(ndigits, weight, sign, dscale as u16);
    for group in groups {
        out.extend_from_slice(&group.to_be_bytes());
    }
    Ok(out)
}

/// Decode NUMERIC binary form into its canonical text, keeping `dscale` fraction digits.
pub fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid NUMERIC payload: too short".into());
    }

    let ndigits = i16::from_be_bytes([raw[0], raw[1]]);
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as i64;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = u16::from_be_bytes([raw[6], raw[7]]) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid NUMERIC sign: {other:#06x}").into()),
    }

    if ndigits < 0 {
        return Err("invalid NUMERIC payload: negative digit count".into());
    }
    let ndigits = ndigits as usize;
    if raw.len() < 8 + ndigits * 2 {
        return Err("invalid NUMERIC payload: truncated digits".into());
    }

    let mut digits = Vec::with_capacity(ndigits);
    for index in 0..ndigits {
        let offset = 8 + index * 2;
        let group = u16::from_be_bytes([raw[offset], raw[offset + 1]]);
        if group > 9999 {
            return Err("invalid NUMERIC payload: group out of range".into());
        }
        digits.push(group);
    }

    let group_at = |index: i64| -> u16 {
        usize::try_from(index)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut integer_text = String::new();
    for index in 0..=weight.max(-1) {
        integer_text.push_str(&format!("{:04}", group_at(index)));
    }
    let integer_text = match integer_text.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    let mut fraction_text = String::new();
    if dscale > 0 {
        for k in 1..=dscale.div_ceil(4) as i64 {
            fraction_text.push_str(&format!("{:04}", group_at(weight + k)));
        }
        fraction_text.truncate(dscale);
    }

    let mut output = String::new();
    if sign == NUMERIC_NEG && digits.iter().any(|d| *d != 0) {
        output.push('-');
    }
    output.push_str(integer_text);
    if !fraction_text.is_empty() {
        output.push('.');
        output.push_str(&fraction_text);
    }
    Ok(output)
}
