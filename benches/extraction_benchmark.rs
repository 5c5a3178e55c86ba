use chat_link_preview::{extract_links, MetadataExtractor};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

const MOCK_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Test Page</title>
    <meta name="description" content="Plain description">
    <meta property="og:title" content="Test Title">
    <meta property="og:description" content="Test Description">
    <meta property="og:image" content="https://example.com/image.jpg">
    <script>var ignored = "<title>not this</title>";</script>
</head>
<body>
    <h1>Test Content</h1>
</body>
</html>"#;

const CHAT_LINE: &str = "\x02look\x02: https://example.com/a, http://example.org/b?c=d \
                         and (https://example.net/e). also \x0304red\x03 text";

fn bench_metadata(c: &mut Criterion) {
    let extractor = MetadataExtractor::new();
    let mut group = c.benchmark_group("metadata_extraction");

    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));

    group.bench_function("open_graph_page", |b| {
        b.iter(|| black_box(extractor.extract(black_box(MOCK_HTML))))
    });

    let broken = &MOCK_HTML[..MOCK_HTML.len() / 2];
    group.bench_function("truncated_page", |b| {
        b.iter(|| black_box(extractor.extract(black_box(broken))))
    });

    group.finish();
}

fn bench_link_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_extraction");

    group.bench_function("formatted_chat_line", |b| {
        b.iter(|| black_box(extract_links(black_box(CHAT_LINE))))
    });

    let long_line = CHAT_LINE.repeat(50);
    group.bench_function("long_chat_line", |b| {
        b.iter(|| black_box(extract_links(black_box(&long_line))))
    });

    group.finish();
}

criterion_group!(benches, bench_metadata, bench_link_extraction);
criterion_main!(benches);
