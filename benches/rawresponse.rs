use criterion::{black_box, criterion_group, criterion_main, Criterion};
use swordnet::http::orderedheaders::OrderedHeaderMap;
use swordnet::http::rawresponse::{find_head_end, parse_response_head};

const DEPOSIT_RECEIPT: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n\
HTTP/1.1 201 Created\r\n\
Date: Mon, 19 Oct 2026 10:00:00 GMT\r\n\
Server: Apache/2.4\r\n\
Location: http://localhost:8080/edit-uri/c1/e7\r\n\
Content-Type: application/atom+xml;type=entry\r\n\
Content-Length: 1834\r\n\
ETag: \"e7-1\"\r\n\
Cache-Control: no-cache\r\n\
\r\n";

fn benchmark_parse_with_interim(c: &mut Criterion) {
    c.bench_function("parse_response_head_interim", |b| {
        b.iter(|| parse_response_head(black_box(DEPOSIT_RECEIPT)).unwrap())
    });
}

fn benchmark_parse_plain(c: &mut Criterion) {
    let plain = b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 0\r\n\r\n";
    c.bench_function("parse_response_head_plain", |b| {
        b.iter(|| parse_response_head(black_box(plain)).unwrap())
    });
}

fn benchmark_find_head_end(c: &mut Criterion) {
    let mut stream = DEPOSIT_RECEIPT.to_vec();
    stream.extend_from_slice(&[b'x'; 1834]);
    c.bench_function("find_head_end", |b| {
        b.iter(|| find_head_end(black_box(&stream)))
    });
}

fn benchmark_request_headers(c: &mut Criterion) {
    c.bench_function("request_headers_to_header_map", |b| {
        b.iter(|| {
            let headers = OrderedHeaderMap::from_pairs([
                ("Content-Type", "application/zip"),
                ("Content-Disposition", "attachment; filename=example.zip"),
                ("Packaging", "http://purl.org/net/sword/package/SimpleZip"),
                ("In-Progress", "false"),
            ])
            .unwrap();
            black_box(headers.to_header_map())
        })
    });
}

criterion_group!(
    benches,
    benchmark_parse_with_interim,
    benchmark_parse_plain,
    benchmark_find_head_end,
    benchmark_request_headers
);
criterion_main!(benches);
