#![no_main]

use libfuzzer_sys::fuzz_target;
use spectral_graph::mgf;
use spectral_graph::SpectrumFile;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Must never panic, whatever the input
    if let Ok(records) = mgf::parse(text) {
        for record in &records {
            let _ = record.spectrum_id();
            let _ = record.precursor_mz();
        }
    }

    if let Ok(file) = SpectrumFile::parse(text) {
        assert_eq!(file.raw(), text);
        let _ = file.spectrum_id();
    }
});
