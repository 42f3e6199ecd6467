//! Integration tests for saving and loading layouts and matrices

mod common;

use common::{ALL_KINDS, ALL_ORGANIZATIONS, layout, random_matrix, random_sizes, rng};
use segmr::prelude::*;
use std::io::Cursor;

#[test]
fn test_layouts_reload_identically() {
    let mut rng = rng(21);
    let sizes = random_sizes(&mut rng, 90, 15);
    for kind in ALL_KINDS {
        for organization in ALL_ORGANIZATIONS {
            let original = layout(kind, organization, &sizes);
            let mut bytes = Vec::new();
            original.save(&mut bytes).unwrap();

            let loaded = AnySegments::<i32>::load(&mut Cursor::new(&bytes)).unwrap();
            assert_eq!(loaded.kind(), kind);
            assert_eq!(loaded.organization(), original.organization());
            assert_eq!(loaded.storage_size(), original.storage_size());
            assert_eq!(loaded.segments_sizes().unwrap(), sizes);
            for s in 0..sizes.len() {
                for l in 0..sizes[s] as usize {
                    assert_eq!(
                        loaded.global_index(s, l).unwrap(),
                        original.global_index(s, l).unwrap()
                    );
                }
            }
        }
    }
}

#[test]
fn test_concrete_layout_reloads() {
    let mut bi = BiEllpack::<u64>::with_strip_size(ElementsOrganization::ColumnMajor, 8)
        .unwrap();
    bi.set_segments_sizes(&[3, 9, 0, 1, 4, 4, 2, 7, 1, 1]).unwrap();
    let mut bytes = Vec::new();
    bi.save(&mut bytes).unwrap();
    let loaded = BiEllpack::<u64>::load(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(loaded.strip_size(), 8);
    assert_eq!(loaded.segments_permutation(), bi.segments_permutation());
    assert_eq!(loaded.group_pointers(), bi.group_pointers());
}

#[test]
fn test_other_layout_rejected() {
    let csr = Csr::<i32>::from_sizes(&[1, 2, 3]).unwrap();
    let mut bytes = Vec::new();
    csr.save(&mut bytes).unwrap();
    assert!(matches!(
        Ellpack::<i32>::load(&mut Cursor::new(&bytes)),
        Err(Error::IncompatibleLayout { .. })
    ));
    assert!(matches!(
        Csr::<i64>::load(&mut Cursor::new(&bytes)),
        Err(Error::IncompatibleLayout { .. })
    ));
    assert!(matches!(
        SparseMatrix::<f64, i32>::load(&mut Cursor::new(&bytes)),
        Err(Error::IncompatibleLayout { .. })
    ));
}

#[test]
fn test_required_organization_checked() {
    let ell = Ellpack::<i64>::from_sizes_with(&[2, 5, 1], ElementsOrganization::ColumnMajor).unwrap();
    let mut bytes = Vec::new();
    ell.save(&mut bytes).unwrap();
    assert!(matches!(
        Ellpack::<i64>::load_organized(&mut Cursor::new(&bytes), ElementsOrganization::RowMajor),
        Err(Error::IncompatibleLayout { .. })
    ));
    let loaded =
        Ellpack::<i64>::load_organized(&mut Cursor::new(&bytes), ElementsOrganization::ColumnMajor)
            .unwrap();
    assert!(loaded == ell);
}

#[test]
fn test_truncated_stream_is_io_error() {
    let ell = Ellpack::<i32>::from_sizes(&[4, 4, 4]).unwrap();
    let mut bytes = Vec::new();
    ell.save(&mut bytes).unwrap();
    bytes.truncate(bytes.len() - 3);
    assert!(matches!(
        Ellpack::<i32>::load(&mut Cursor::new(&bytes)),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_bad_magic_rejected() {
    let bytes = b"NOPE\x01\x00\x00\x00".to_vec();
    assert!(matches!(
        Csr::<i32>::load(&mut Cursor::new(&bytes)),
        Err(Error::IncompatibleLayout { .. })
    ));
}

#[test]
fn test_matrix_reloads_with_values() {
    let mut rng = rng(8);
    let (client, _) = common::create_cpu_client();
    for kind in ALL_KINDS {
        let m = random_matrix(&mut rng, kind, ElementsOrganization::ColumnMajor, 50, 17);
        let mut bytes = Vec::new();
        m.save(&mut bytes).unwrap();

        let loaded =
            SparseMatrix::<f64, i32, AnySegments<i32>>::load(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(loaded.rows(), 50);
        assert_eq!(loaded.columns(), 17);
        assert_eq!(loaded.column_indexes(), m.column_indexes());
        assert_eq!(loaded.values(), m.values());
        assert_eq!(
            loaded.row_sums(&client).unwrap(),
            m.row_sums(&client).unwrap()
        );

        assert!(matches!(
            SparseMatrix::<f32, i32, AnySegments<i32>>::load(&mut Cursor::new(&bytes)),
            Err(Error::IncompatibleLayout { .. })
        ));
    }
}

#[test]
fn test_uninitialized_matrix_not_saved() {
    let m = SparseMatrix::<f64, i32>::new(3, 3);
    assert!(matches!(
        m.save(&mut Vec::new()),
        Err(Error::NotInitialized { .. })
    ));
}
