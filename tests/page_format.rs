use pagetree::{PageError, PageHeader, PageType, SlottedPage, HEADER_SIZE, PAGE_SIZE};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn empty_leaf_page_reports_4066_free_bytes() {
    init_logger();
    let page = SlottedPage::new(1, PageType::Leaf);
    assert_eq!(HEADER_SIZE, 30);
    assert_eq!(page.free_space(), 4066);
}

#[test]
fn stored_image_matches_canonical_layout() {
    init_logger();
    let mut page = SlottedPage::new(3, PageType::Leaf);
    page.insert_leaf_entry(10, 7).unwrap();
    let bytes = page.store();

    assert_eq!(&bytes[4..8], b"EGAP");
    assert_eq!(u16::from_le_bytes([bytes[10], bytes[11]]), 2);
    assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 3);
    assert_eq!(u16::from_le_bytes([bytes[24], bytes[25]]) as usize, PAGE_SIZE - 8);
    assert_eq!(u16::from_le_bytes([bytes[26], bytes[27]]) as usize, HEADER_SIZE + 8);
    assert_eq!(u16::from_le_bytes([bytes[28], bytes[29]]), 1);

    // Slot 0 points at the record packed against the end of the page.
    assert_eq!(u32::from_le_bytes(bytes[30..34].try_into().unwrap()) as usize, PAGE_SIZE - 8);
    assert_eq!(u32::from_le_bytes(bytes[34..38].try_into().unwrap()), 8);
    assert_eq!(&bytes[PAGE_SIZE - 8..], &[10, 0, 0, 0, 7, 0, 0, 0]);
}

#[test]
fn corrupting_any_byte_after_the_checksum_is_detected() {
    init_logger();
    let mut page = SlottedPage::new(5, PageType::Leaf);
    for key in [3, 1, 2] {
        page.insert_leaf_entry(key, key).unwrap();
    }
    let bytes = page.store();
    assert!(PageHeader::load(&bytes).is_ok());

    for idx in (4..PAGE_SIZE).step_by(97) {
        let mut corrupt = bytes;
        corrupt[idx] ^= 0x80;
        assert!(matches!(
            SlottedPage::load(&corrupt),
            Err(PageError::ChecksumMismatch { .. })
        ));
    }
}

#[test]
fn zeroed_image_is_rejected() {
    init_logger();
    let bytes = [0u8; PAGE_SIZE];
    assert!(SlottedPage::load(&bytes).is_err());
}
