//! S3 XML response rendering.
//!
//! The gateway's XML surface is small: the `<ListBucketResult>` document
//! and the `<Error>` document. Both are produced with `quick-xml`.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::store::ListResult;

// ── Error response ──────────────────────────────────────────────────

/// Render an S3 `<Error>` XML document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchKey</Code>
///   <Message>The resource you requested does not exist</Message>
///   <Resource>mybucket/data/file1</Resource>
///   <RequestId>ABCD1234ABCD1234</RequestId>
/// </Error>
/// ```
pub fn render_error(code: &str, message: &str, resource: &str, request_id: &str) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect("xml decl");

    writer
        .write_event(Event::Start(BytesStart::new("Error")))
        .expect("start Error");
    write_text_element(&mut writer, "Code", code);
    write_text_element(&mut writer, "Message", message);
    write_text_element(&mut writer, "Resource", resource);
    write_text_element(&mut writer, "RequestId", request_id);
    writer
        .write_event(Event::End(BytesEnd::new("Error")))
        .expect("end Error");

    String::from_utf8(writer.into_inner().into_inner()).expect("valid utf-8")
}

// ── ListBucketResult ────────────────────────────────────────────────

/// Render `<ListBucketResult>` for a bucket listing.
///
/// `IsTruncated` is always `false`: continuation tokens are unsupported.
pub fn render_list_bucket_result(list: &ListResult) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect("xml decl");

    let root = BytesStart::new("ListBucketResult")
        .with_attributes([("xmlns", "http://s3.amazonaws.com/doc/2006-03-01/")]);
    writer.write_event(Event::Start(root)).expect("start root");

    write_text_element(&mut writer, "Name", &list.bucket);
    write_text_element(&mut writer, "Prefix", &list.prefix);
    write_text_element(&mut writer, "KeyCount", &list.key_count.to_string());
    write_text_element(&mut writer, "MaxKeys", &list.max_keys.to_string());
    write_text_element(
        &mut writer,
        "IsTruncated",
        if list.is_truncated { "true" } else { "false" },
    );

    for entry in &list.entries {
        writer
            .write_event(Event::Start(BytesStart::new("Contents")))
            .expect("start Contents");
        write_text_element(&mut writer, "Key", &entry.key);
        write_text_element(&mut writer, "Size", &entry.size.to_string());
        write_text_element(&mut writer, "LastModified", &entry.last_modified);
        write_text_element(&mut writer, "ETag", &format!("\"{}\"", entry.etag));
        write_text_element(&mut writer, "StorageClass", "STANDARD");
        writer
            .write_event(Event::End(BytesEnd::new("Contents")))
            .expect("end Contents");
    }

    writer
        .write_event(Event::End(BytesEnd::new("ListBucketResult")))
        .expect("end root");

    String::from_utf8(writer.into_inner().into_inner()).expect("valid utf-8")
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .expect("start element");
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .expect("text");
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .expect("end element");
}

// ── Tests ───────────────────────────────────────────────────────────
