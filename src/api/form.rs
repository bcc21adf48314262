use std::collections::HashMap;
use std::io::{Cursor, Read};

use multipart::server::Multipart;

use crate::error::{GuestCounterError, Result};
use crate::zone::Zone;

/// Fields of a `POST /process-image` form.
#[derive(Debug)]
pub(crate) struct ProcessForm {
    pub file: Vec<u8>,
    pub zone: Zone,
}

/// Boundary parameter of a `multipart/form-data` content type.
pub(crate) fn multipart_boundary(content_type: &str) -> Option<String> {
    let (mime, params) = content_type.split_once(';')?;
    if !mime.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .split(';')
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

pub(crate) fn parse_process_form(content_type: Option<&str>, body: &[u8]) -> Result<ProcessForm> {
    let boundary = content_type.and_then(multipart_boundary).ok_or_else(|| {
        GuestCounterError::BadRequest("expected multipart/form-data with a boundary".into())
    })?;

    let mut form = Multipart::with_body(Cursor::new(body), boundary);
    let mut file = None;
    let mut fields = HashMap::new();
    while let Some(mut field) = form
        .read_entry()
        .map_err(|e| GuestCounterError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.headers.name.to_string();
        let mut data = Vec::new();
        field
            .data
            .read_to_end(&mut data)
            .map_err(|e| GuestCounterError::BadRequest(format!("malformed form field {name}: {e}")))?;
        if name == "file" {
            file = Some(data);
        } else {
            fields.insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }

    let file = file.ok_or_else(|| GuestCounterError::BadRequest("missing form field 'file'".into()))?;
    let coord = |key: &str| {
        fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| GuestCounterError::InvalidZone(format!("missing form field '{key}'")))
    };
    let zone = Zone::parse(coord("x1")?, coord("y1")?, coord("x2")?, coord("y2")?)?;
    Ok(ProcessForm { file, zone })
}

#[cfg(test)]
pub(crate) fn encode_form(boundary: &str, file: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"table.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(b"\r\n");
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
