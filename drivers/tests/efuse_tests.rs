/*++

Licensed under the Apache-2.0 license.

File Name:

    efuse_tests.rs

Abstract:

    File contains test cases for the eFuse write and protection API.

--*/

use hsm_drivers::layout::*;
use hsm_drivers::{
    aes_key_crc, BootEnvCtrl, BootEnvCtrlBits, CrcKind, EnvSample, FuseAddress, GlitchCfg,
    HsmError, IvKind, Key256, MiscCtrlBits, Page, PpkKind, PufHelperData, SecCtrlBits,
    SecMisc1Bits, UserFuses, WriteRequest, WriteState,
};
use hsm_emu_periph::{EmuEfuseCtrl, KeySlot, SessionMonitor};

mod harness;
use harness::{test_config, TestDevice};

const KEY: [u32; 8] = [
    0x0000_0001,
    0x0000_0003,
    0x8000_0000,
    0x0F00_0000,
    0x0000_0000,
    0x1234_5678,
    0xFFFF_0000,
    0x0000_00FF,
];

fn key_request(key: [u32; 8]) -> WriteRequest {
    WriteRequest {
        aes_key: Some(Key256(key)),
        ..Default::default()
    }
}

fn popcount(words: &[u32]) -> usize {
    words.iter().map(|w| w.count_ones() as usize).sum()
}

#[test]
fn test_aes_key_fresh_device() {
    let mut dev = TestDevice::fresh();
    assert_eq!(dev.efuse.write(&key_request(KEY)), Ok(()));
    assert_eq!(dev.efuse.state(), WriteState::Locked);
    assert!(dev.hw.borrow().is_locked());

    // Only the 1-bits of the key plus the AES protection bit.
    assert_eq!(dev.pgm_writes(), popcount(&KEY) + 1);
    for (i, word) in KEY.iter().enumerate() {
        assert_eq!(dev.fuse(0, AES_KEY_START_ROW + i as u32), *word);
    }
    assert_eq!(dev.fuse(0, PROTECTION_ROW), ANCHOR_PATTERN | 1 << 11);
    assert_eq!(
        dev.efuse.check_crc(CrcKind::AesKey, aes_key_crc(&KEY)),
        Ok(true)
    );

    dev.log.clear();
    assert_eq!(
        dev.efuse.write(&key_request(KEY)),
        Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED)
    );
    assert_eq!(dev.pgm_writes(), 0);
    assert_eq!(dev.efuse.state(), WriteState::Failed);
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_key_rows_never_read_from_cache() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        aes_key: Some(Key256(KEY)),
        user_key0: Some(Key256([0x0101_0101; 8])),
        user_key1: Some(Key256([0x8000_0001; 8])),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.cache_reads(AES_KEY_START_ROW..USER_KEY1_START_ROW + 8), 0);
    assert_eq!(
        dev.fuse(0, PROTECTION_ROW) & (0b111 << 11),
        0b111 << 11
    );

    dev.log.clear();
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED)
    );
    assert_eq!(dev.cache_reads(AES_KEY_START_ROW..USER_KEY1_START_ROW + 8), 0);
}

#[test]
fn test_user_key_already_provisioned() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn_key(KeySlot::User1, &[5; 8]);
    let req = WriteRequest {
        user_key1: Some(Key256([7; 8])),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED)
    );
    assert_eq!(dev.pgm_writes(), 0);
}

#[test]
fn test_zero_key_rejected() {
    let mut dev = TestDevice::fresh();
    assert_eq!(
        dev.efuse.write(&key_request([0; 8])),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
    assert_eq!(dev.pgm_writes(), 0);
}

#[test]
fn test_key_write_locked() {
    let mut dev = TestDevice::fresh();
    dev.hw
        .borrow_mut()
        .burn(0, SEC_CTRL_ROW, SecCtrlBits::AES_WR_LK.bits());
    assert_eq!(
        dev.efuse.write(&key_request(KEY)),
        Err(HsmError::DRIVER_EFUSE_FUSE_PROTECTED)
    );
    assert_eq!(dev.pgm_writes(), 0);
}

#[test]
fn test_dec_only_without_key() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        dec_only: true,
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_DEPENDENCY_UNMET)
    );
    assert_eq!(dev.pgm_writes(), 0);
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_dec_only_without_iv() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        aes_key: Some(Key256(KEY)),
        dec_only: true,
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_DEPENDENCY_UNMET)
    );
    assert_eq!(dev.pgm_writes(), 0);
}

#[test]
fn test_dec_only_with_key_and_iv_in_request() {
    let mut dev = TestDevice::fresh();
    let mut iv = [None; 4];
    iv[IvKind::BlkObfus as usize] = Some([1, 2, 3]);
    let req = WriteRequest {
        aes_key: Some(Key256(KEY)),
        iv,
        dec_only: true,
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.efuse.read_dec_only(), Ok(true));
    assert_eq!(dev.efuse.read_iv(IvKind::BlkObfus), Ok([1, 2, 3]));
    assert_eq!(
        dev.fuse(0, PROTECTION_ROW) & !ANCHOR_MASK,
        0b11 << 2 | 1 << 11
    );
}

#[test]
fn test_dec_only_with_key_already_programmed() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn_key(KeySlot::Aes, &KEY);
    dev.hw.borrow_mut().burn(0, BLK_OBFUS_IV_START_ROW, 0xC0FFEE);
    let req = WriteRequest {
        dec_only: true,
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.fuse(0, DEC_ONLY_ROW), 0xFFFF);
}

#[test]
fn test_revocation_subset_is_noop() {
    let mut dev = TestDevice::fresh();
    let mut ids = [0u32; 8];
    ids[0] = 0b1011;
    ids[5] = 1 << 20;
    let req = WriteRequest {
        revocation_ids: Some(ids),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.pgm_writes(), 4);

    dev.log.clear();
    assert_eq!(dev.efuse.write(&req), Ok(()));
    let mut subset = [0u32; 8];
    subset[0] = 0b0011;
    let req = WriteRequest {
        revocation_ids: Some(subset),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.pgm_writes(), 0);
    assert_eq!(dev.efuse.read_revocation_id(0), Ok(0b1011));
    assert_eq!(dev.efuse.read_revocation_id(5), Ok(1 << 20));
}

#[test]
fn test_revocation_ids_accumulate() {
    let mut dev = TestDevice::fresh();
    let mut ids = [0u32; 8];
    ids[0] = 1 << 3;
    let req = WriteRequest {
        revocation_ids: Some(ids),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));

    dev.log.clear();
    ids[0] = 1 << 5;
    let req = WriteRequest {
        revocation_ids: Some(ids),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.pgm_writes(), 1);
    assert_eq!(dev.fuse(0, REVOCATION_ID_START_ROW), 0b10_1000);

    assert_eq!(dev.efuse.revoke_id(32 + 7), Ok(()));
    assert_eq!(dev.efuse.read_revocation_id(1), Ok(1 << 7));
    assert_eq!(
        dev.efuse.revoke_id(256),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
}

#[test]
fn test_sec_ctrl_bits_accumulate() {
    let mut dev = TestDevice::fresh();
    for bits in [SecCtrlBits::JTAG_DIS, SecCtrlBits::PPK0_WR_LK] {
        let req = WriteRequest {
            sec_ctrl: Some(bits),
            ..Default::default()
        };
        assert_eq!(dev.efuse.write(&req), Ok(()));
    }
    assert_eq!(
        dev.efuse.read_sec_ctrl_bits(),
        Ok(SecCtrlBits::JTAG_DIS | SecCtrlBits::PPK0_WR_LK)
    );
}

#[test]
fn test_misc_ctrl_bits_accumulate() {
    let mut dev = TestDevice::fresh();
    for bits in [MiscCtrlBits::HALT_BOOT_ERROR, MiscCtrlBits::PPK0_INVALID] {
        let req = WriteRequest {
            misc_ctrl: Some(bits),
            ..Default::default()
        };
        assert_eq!(dev.efuse.write(&req), Ok(()));
    }
    assert_eq!(
        dev.efuse.read_misc_ctrl_bits(),
        Ok(MiscCtrlBits::HALT_BOOT_ERROR | MiscCtrlBits::PPK0_INVALID)
    );

    assert_eq!(dev.efuse.revoke_ppk(PpkKind::Ppk1), Ok(()));
    assert!(dev
        .efuse
        .read_misc_ctrl_bits()
        .unwrap()
        .contains(MiscCtrlBits::PPK1_INVALID));
    assert_ne!(dev.fuse(0, PROTECTION_ROW) & (1 << 8), 0);
}

#[test]
fn test_user_fuse_cant_revert() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn(0, USER_FUSE_START_ROW, 0b1011);

    let req = WriteRequest {
        user_fuses: Some(UserFuses::new(1, &[0b0100]).unwrap()),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_BIT_CANT_REVERT)
    );
    assert_eq!(dev.pgm_writes(), 0);

    let req = WriteRequest {
        user_fuses: Some(UserFuses::new(1, &[0b1111]).unwrap()),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.pgm_writes(), 1);
    assert_eq!(dev.fuse(0, USER_FUSE_START_ROW), 0b1111);
}

#[test]
fn test_user_fuses() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        user_fuses: Some(UserFuses::new(3, &[0xAA, 0x55]).unwrap()),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.fuse(0, USER_FUSE_START_ROW + 2), 0xAA);

    let mut out = [0u32; 2];
    assert_eq!(dev.efuse.read_user_fuses(3, &mut out), Ok(()));
    assert_eq!(out, [0xAA, 0x55]);
    assert_eq!(
        dev.efuse.read_user_fuses(63, &mut out),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
}

#[test]
fn test_user_fuse_range_does_not_wrap() {
    let dev = TestDevice::fresh();
    let mut out = [0u32; 2];
    assert_eq!(
        dev.efuse.read_user_fuses(u32::MAX, &mut out),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
    assert!(dev.log.is_empty());
    assert_eq!(
        UserFuses::new(u32::MAX, &[1, 2]),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
}

#[test]
fn test_ppk_hash_protected_by_write_lock() {
    let mut dev = TestDevice::fresh();
    dev.hw
        .borrow_mut()
        .burn(0, SEC_CTRL_ROW, SecCtrlBits::PPK0_WR_LK.bits());
    let mut req = WriteRequest::default();
    req.ppk_hash[PpkKind::Ppk0 as usize] = Some([0x11; 8]);
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_FUSE_PROTECTED)
    );

    let mut req = WriteRequest::default();
    req.ppk_hash[PpkKind::Ppk1 as usize] = Some([0x22; 8]);
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.efuse.read_ppk_hash(PpkKind::Ppk1), Ok([0x22; 8]));
    assert_eq!(dev.fuse(0, PROTECTION_ROW) & (0b11 << 4), 0b11 << 4);
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED)
    );
}

#[test]
fn test_glitch_cfg_lock_burned_last() {
    let mut dev = TestDevice::fresh();
    let cfg = GlitchCfg {
        value: 0x155,
        write_lock: true,
    };
    let req = WriteRequest {
        glitch_cfg: Some(cfg),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.efuse.read_glitch_cfg(), Ok(cfg));
    let pgm = dev.log.values_written_to(EmuEfuseCtrl::PGM_ADDR);
    assert_eq!(pgm.last(), Some(&(GLITCH_ROW << 5 | 31)));

    dev.log.clear();
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.pgm_writes(), 0);

    let req = WriteRequest {
        glitch_cfg: Some(GlitchCfg {
            value: 0x1FF,
            write_lock: true,
        }),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_FUSE_PROTECTED)
    );
}

#[test]
fn test_misc_ctrl_and_sec_ctrl() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        misc_ctrl: Some(MiscCtrlBits::PPK0_INVALID | MiscCtrlBits::LBIST_EN),
        sec_ctrl: Some(SecCtrlBits::JTAG_DIS),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(
        dev.efuse.read_misc_ctrl_bits(),
        Ok(MiscCtrlBits::PPK0_INVALID | MiscCtrlBits::LBIST_EN)
    );
    assert_eq!(dev.efuse.read_sec_ctrl_bits(), Ok(SecCtrlBits::JTAG_DIS));
    assert_eq!(
        dev.fuse(0, PROTECTION_ROW) & !ANCHOR_MASK,
        0b11 | 1 << 8
    );
}

#[test]
fn test_misc_ctrl_unprotected_bits() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        misc_ctrl: Some(MiscCtrlBits::LBIST_EN),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.fuse(0, PROTECTION_ROW), ANCHOR_PATTERN);
}

#[test]
fn test_puf_helper_data() {
    let mut dev = TestDevice::fresh();
    let mut puf = PufHelperData {
        chash: 0x1234_5678,
        aux: 0x00AB_CDEF,
        ..Default::default()
    };
    puf.syndrome[0] = 1;
    puf.syndrome[126] = 0x8000_0000;
    let req = WriteRequest {
        puf_helper_data: Some(puf.clone()),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert!(dev.efuse.read_puf_helper_data() == Ok(puf));
    assert_eq!(dev.fuse(2, 126), 0x8000_0000);
    assert_eq!(dev.fuse(0, PROTECTION_ROW) & 1 << 9, 1 << 9);
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED)
    );
}

#[test]
fn test_puf_aux_out_of_range() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        puf_helper_data: Some(PufHelperData {
            syndrome: [1; 127],
            chash: 1,
            aux: 0x0100_0000,
        }),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
    assert_eq!(dev.pgm_writes(), 0);
}

#[test]
fn test_protect_is_idempotent() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        sec_ctrl: Some(SecCtrlBits::JTAG_DIS),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));

    dev.log.clear();
    assert_eq!(dev.efuse.protect(), Ok(0));
    assert_eq!(dev.efuse.protect(), Ok(0));
    assert_eq!(dev.pgm_writes(), 0);
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_protect_covers_provisioned_content() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn(0, META_HEADER_IV_START_ROW, 0x1234);
    dev.hw.borrow_mut().burn_key(KeySlot::User0, &KEY);
    assert_eq!(dev.efuse.protect(), Ok(3));
    assert_eq!(
        dev.fuse(0, PROTECTION_ROW) & !ANCHOR_MASK,
        0b11 << 6 | 1 << 12
    );
    assert_eq!(dev.efuse.protect(), Ok(0));
}

#[test]
fn test_glitched_protection_check() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        sec_ctrl: Some(SecCtrlBits::JTAG_DIS),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));

    dev.hw
        .borrow_mut()
        .glitch_cache_read(0, SEC_CTRL_ROW, 0, SecCtrlBits::JTAG_DIS.bits());
    let err = dev.efuse.protect().unwrap_err();
    assert_eq!(err, HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE);
    assert!(err.is_integrity_fault());
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_glitched_protection_row_during_write() {
    let mut dev = TestDevice::fresh();
    dev.hw
        .borrow_mut()
        .glitch_cache_read(0, PROTECTION_ROW, 1, 1 << 31);
    let req = WriteRequest {
        sec_ctrl: Some(SecCtrlBits::JTAG_DIS),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE)
    );
    assert_eq!(dev.efuse.state(), WriteState::Failed);
}

#[test]
fn test_emptied_protected_range() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn(0, PROTECTION_ROW, 0b11 << 4);
    assert_eq!(
        dev.efuse.protect(),
        Err(HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE)
    );
}

#[test]
fn test_bad_anchor_bits() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn(0, PROTECTION_ROW, 1 << 28);
    assert_eq!(
        dev.efuse.protect(),
        Err(HsmError::DRIVER_EFUSE_ANCHOR_BIT_PATTERN)
    );
}

#[test]
fn test_program_timeout() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().stall_program();
    let mut ids = [0u32; 8];
    ids[2] = 1 << 7;
    let req = WriteRequest {
        revocation_ids: Some(ids),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_PGM_TIMEOUT)
    );
    let failure = dev.efuse.last_bit_failure().unwrap();
    assert_eq!(
        failure.addr,
        FuseAddress::new(Page::Page0, REVOCATION_ID_START_ROW + 2, 7).unwrap()
    );
    assert_eq!(failure.error, HsmError::DRIVER_EFUSE_PGM_TIMEOUT);
    assert_eq!(dev.efuse.state(), WriteState::Failed);
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_program_rejected_keeps_earlier_bits() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        user_fuses: Some(UserFuses::new(1, &[0x3]).unwrap()),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.efuse.last_bit_failure(), None);

    dev.hw.borrow_mut().reject_program();
    let req = WriteRequest {
        user_fuses: Some(UserFuses::new(1, &[0x7]).unwrap()),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_PGM_REJECTED)
    );
    assert_eq!(dev.fuse(0, USER_FUSE_START_ROW), 0x3);
    assert_eq!(dev.efuse.last_bit_failure().unwrap().addr.col(), 2);
}

#[test]
fn test_blank_device() {
    let mut dev = TestDevice::new(EmuEfuseCtrl::blank());
    assert_eq!(
        dev.efuse.write(&key_request(KEY)),
        Err(HsmError::DRIVER_EFUSE_BLANK_DEVICE)
    );
    assert_eq!(dev.pgm_writes(), 0);
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_empty_request() {
    let mut dev = TestDevice::fresh();
    assert_eq!(
        dev.efuse.write(&WriteRequest::default()),
        Err(HsmError::DRIVER_EFUSE_EMPTY_REQUEST)
    );
    assert!(dev.log.is_empty());
    assert_eq!(dev.efuse.state(), WriteState::Idle);
}

#[test]
fn test_cache_parity() {
    let mut dev = TestDevice::fresh();
    dev.hw
        .borrow_mut()
        .inject_parity_error(0, REVOCATION_ID_START_ROW);
    assert_eq!(
        dev.efuse.read_revocation_id(0),
        Err(HsmError::DRIVER_EFUSE_CACHE_PARITY)
    );
    assert_eq!(dev.efuse.read_revocation_id(1), Ok(0));
    let req = WriteRequest {
        revocation_ids: Some([1; 8]),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_CACHE_PARITY)
    );
    assert_eq!(dev.pgm_writes(), 0);
}

#[test]
fn test_cache_load_failure() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().fail_cache_load();
    let req = WriteRequest {
        sec_ctrl: Some(SecCtrlBits::JTAG_DIS),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_CACHE_LOAD_FAILURE)
    );
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_session_registers() {
    let mut dev = TestDevice::fresh();
    let req = WriteRequest {
        sec_ctrl: Some(SecCtrlBits::JTAG_DIS),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.log.values_written_to(EmuEfuseCtrl::TPGM), [167]);
    assert_eq!(dev.log.values_written_to(EmuEfuseCtrl::TRDM), [17]);
    assert_eq!(dev.log.values_written_to(EmuEfuseCtrl::WR_LOCK)[0], 0xDF0D);
    assert_eq!(dev.log.values_written_to(EmuEfuseCtrl::PD), [0]);
    assert_eq!(
        dev.log.values_written_to(EmuEfuseCtrl::WR_LOCK).last(),
        Some(&0)
    );
}

#[test]
fn test_read_apis() {
    let dev = TestDevice::fresh();
    assert_eq!(dev.efuse.read_dna(), Ok(EmuEfuseCtrl::DNA));
    assert_eq!(dev.efuse.get_cached_word(PROTECTION_ROW), Ok(ANCHOR_PATTERN));
    assert_eq!(
        dev.efuse.get_cached_word(AES_KEY_START_ROW),
        Err(HsmError::DRIVER_EFUSE_WRITE_ONLY_ROW)
    );
    assert_eq!(
        dev.efuse.get_cached_word(256),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
    assert_eq!(
        dev.efuse.read_revocation_id(8),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
    assert_eq!(dev.efuse.read_dec_only(), Ok(false));
    assert_eq!(dev.efuse.read_iv(IvKind::Plm), Ok([0; 3]));
    assert_eq!(
        dev.efuse.check_crc(CrcKind::UserKey0, aes_key_crc(&[0; 8])),
        Ok(true)
    );
}

#[test]
fn test_parallel_writers_serialize() {
    let monitor = SessionMonitor::new();
    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            let monitor = monitor.clone();
            std::thread::spawn(move || {
                let mut dev =
                    TestDevice::new(EmuEfuseCtrl::new().with_session_monitor(monitor));
                let req = WriteRequest {
                    user_fuses: Some(UserFuses::new(i + 1, &[1 << i]).unwrap()),
                    ..Default::default()
                };
                dev.efuse.write(&req)
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(()));
    }
    assert_eq!(monitor.total(), 4);
    assert_eq!(monitor.max_concurrent(), 1);
}

#[test]
fn test_key_crc_mismatch_stops_write() {
    let mut dev = TestDevice::fresh();
    // Two compares for the blank check, the third follows programming
    dev.hw.borrow_mut().fail_crc(KeySlot::Aes, 2);
    let mut req = key_request(KEY);
    req.ppk_hash[0] = Some([0x1111_1111; 8]);
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_KEY_CRC_MISMATCH)
    );
    assert_eq!(dev.pgm_writes(), popcount(&KEY));
    assert_eq!(
        dev.pgm_writes_to_rows(PPK0_START_ROW..PPK0_START_ROW + 8),
        0
    );
    assert_eq!(dev.fuse(0, PPK0_START_ROW), 0);
    assert_eq!(dev.efuse.state(), WriteState::Failed);
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_stuck_key_bit_fails_crc() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().stick_bit_at_zero(0, AES_KEY_START_ROW, 0);
    assert_eq!(
        dev.efuse.write(&key_request(KEY)),
        Err(HsmError::DRIVER_EFUSE_KEY_CRC_MISMATCH)
    );
    assert_eq!(dev.fuse(0, AES_KEY_START_ROW), 0);
    assert_eq!(dev.efuse.last_bit_failure(), None);
}

#[test]
fn test_verify_failure() {
    let mut dev = TestDevice::fresh();
    dev.hw
        .borrow_mut()
        .stick_bit_at_zero(0, REVOCATION_ID_START_ROW + 1, 4);
    let mut ids = [0u32; 8];
    ids[1] = 1 << 4;
    let req = WriteRequest {
        revocation_ids: Some(ids),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_PGM_VERIFY_FAILED)
    );
    let failure = dev.efuse.last_bit_failure().unwrap();
    assert_eq!(
        failure.addr,
        FuseAddress::new(Page::Page0, REVOCATION_ID_START_ROW + 1, 4).unwrap()
    );
    assert_eq!(failure.error, HsmError::DRIVER_EFUSE_PGM_VERIFY_FAILED);
    assert!(dev.hw.borrow().is_locked());
}

#[test]
fn test_verify_read_timeout() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().stall_read();
    let req = WriteRequest {
        user_fuses: Some(UserFuses::new(2, &[0x10]).unwrap()),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_READ_TIMEOUT)
    );
    assert_eq!(
        dev.efuse.last_bit_failure().unwrap().error,
        HsmError::DRIVER_EFUSE_READ_TIMEOUT
    );
    assert_eq!(dev.efuse.state(), WriteState::Failed);
}

#[test]
fn test_unlock_failure() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().ignore_unlock();
    assert_eq!(
        dev.efuse.write(&key_request(KEY)),
        Err(HsmError::DRIVER_EFUSE_UNLOCK_FAILURE)
    );
    assert_eq!(dev.pgm_writes(), 0);
    assert_eq!(dev.efuse.state(), WriteState::Failed);
    assert_eq!(
        dev.efuse.protect(),
        Err(HsmError::DRIVER_EFUSE_UNLOCK_FAILURE)
    );
}

#[test]
fn test_lock_failure() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().ignore_lock();
    let req = WriteRequest {
        sec_ctrl: Some(SecCtrlBits::JTAG_DIS),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_LOCK_FAILURE)
    );
    assert_eq!(dev.fuse(0, SEC_CTRL_ROW), SecCtrlBits::JTAG_DIS.bits());
    assert_eq!(dev.efuse.state(), WriteState::Failed);
    assert!(!dev.hw.borrow().is_locked());
}

#[test]
fn test_partial_dec_only_fails_integrity() {
    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn(0, DEC_ONLY_ROW, 0x00FF);
    dev.hw.borrow_mut().burn(0, PROTECTION_ROW, 0b11 << 2);
    assert_eq!(
        dev.efuse.protect(),
        Err(HsmError::DRIVER_EFUSE_INTEGRITY_FAILURE)
    );

    let mut dev = TestDevice::fresh();
    dev.hw.borrow_mut().burn(0, DEC_ONLY_ROW, 0xFFFF);
    dev.hw.borrow_mut().burn(0, PROTECTION_ROW, 0b11 << 2);
    assert_eq!(dev.efuse.protect(), Ok(0));
}

#[test]
fn test_boot_env_ctrl() {
    let mut dev = TestDevice::fresh();
    let hot = BootEnvCtrl::new(BootEnvCtrlBits::SYSMON_TEMP_EN, 2, 0, 0, 0).unwrap();
    let req = WriteRequest {
        boot_env_ctrl: Some(hot),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    assert_eq!(dev.efuse.read_boot_env_ctrl(), Ok(hot));
    assert_ne!(dev.fuse(0, PROTECTION_ROW) & (1 << 14), 0);

    dev.log.clear();
    let again = BootEnvCtrl::new(BootEnvCtrlBits::empty(), 1, 0, 0, 0).unwrap();
    let req = WriteRequest {
        boot_env_ctrl: Some(again),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_ALREADY_PROGRAMMED)
    );
    assert_eq!(dev.pgm_writes(), 0);

    let volt = BootEnvCtrl::new(BootEnvCtrlBits::SYSMON_VOLT_EN, 0, 1, 0, 0).unwrap();
    let req = WriteRequest {
        boot_env_ctrl: Some(volt),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    let ctrl = dev.efuse.read_boot_env_ctrl().unwrap();
    assert_eq!(
        ctrl.enables(),
        BootEnvCtrlBits::SYSMON_TEMP_EN | BootEnvCtrlBits::SYSMON_VOLT_EN
    );
    assert_eq!((ctrl.temp_hot(), ctrl.volt_pmc()), (2, 1));

    let req = WriteRequest {
        sec_ctrl: Some(SecCtrlBits::BOOT_ENV_WR_LK),
        ..Default::default()
    };
    assert_eq!(dev.efuse.write(&req), Ok(()));
    let cold = BootEnvCtrl::new(BootEnvCtrlBits::empty(), 0, 0, 0, 3).unwrap();
    let req = WriteRequest {
        boot_env_ctrl: Some(cold),
        ..Default::default()
    };
    assert_eq!(
        dev.efuse.write(&req),
        Err(HsmError::DRIVER_EFUSE_FUSE_PROTECTED)
    );
}

#[test]
fn test_sec_misc1_bits_accumulate() {
    let mut dev = TestDevice::fresh();
    for bits in [SecMisc1Bits::LPD_MBIST_EN, SecMisc1Bits::SYSMON_TEMP_MON_EN] {
        let req = WriteRequest {
            sec_misc1: Some(bits),
            ..Default::default()
        };
        assert_eq!(dev.efuse.write(&req), Ok(()));
    }
    assert_eq!(
        dev.efuse.read_sec_misc1_bits(),
        Ok(SecMisc1Bits::LPD_MBIST_EN | SecMisc1Bits::SYSMON_TEMP_MON_EN)
    );
    assert_ne!(dev.fuse(0, PROTECTION_ROW) & (1 << 15), 0);
    assert_eq!(dev.fuse(0, SEC_MISC1_ROW), 0x1807);
}

#[test]
fn test_offchip_revoke_ids() {
    let mut dev = TestDevice::fresh();
    assert_eq!(dev.efuse.revoke_offchip_id(9), Ok(()));
    assert_eq!(dev.efuse.revoke_offchip_id(3 * 32 + 1), Ok(()));
    assert_eq!(dev.efuse.read_offchip_revoke_id(0), Ok(1 << 9));
    assert_eq!(dev.efuse.read_offchip_revoke_id(3), Ok(1 << 1));
    assert_eq!(dev.fuse(0, OFFCHIP_REVOKE_START_ROW), 1 << 9);
    assert_eq!(
        dev.efuse.read_offchip_revoke_id(8),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
    assert_eq!(
        dev.efuse.revoke_offchip_id(8 * 32),
        Err(HsmError::DRIVER_EFUSE_INVALID_PARAM)
    );
}

fn hot_die() -> EnvSample {
    EnvSample {
        temp_millicelsius: 131_000,
        vccpmc_millivolts: 800,
    }
}

fn nominal_die() -> EnvSample {
    EnvSample {
        temp_millicelsius: 25_000,
        vccpmc_millivolts: 800,
    }
}

#[test]
fn test_env_out_of_range() {
    let mut cfg = test_config();
    cfg.env_monitor = Some(hot_die);
    let mut dev = TestDevice::with_config(EmuEfuseCtrl::new(), cfg);
    assert_eq!(
        dev.efuse.write(&key_request(KEY)),
        Err(HsmError::DRIVER_EFUSE_ENV_OUT_OF_RANGE)
    );
    assert!(dev.log.is_empty());
    assert_eq!(dev.efuse.state(), WriteState::Failed);
    assert_eq!(
        dev.efuse.protect(),
        Err(HsmError::DRIVER_EFUSE_ENV_OUT_OF_RANGE)
    );
    assert!(dev.log.is_empty());

    cfg.env_monitor = Some(nominal_die);
    let mut dev = TestDevice::with_config(EmuEfuseCtrl::new(), cfg);
    assert_eq!(dev.efuse.write(&key_request(KEY)), Ok(()));
}
